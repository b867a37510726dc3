//! Генерация номеров брони.

use rand::rngs::OsRng;
use rand::Rng;

pub const REFERENCE_LENGTH: usize = 8;
pub const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Источник номеров брони. Уникальность проверяет хранилище при коммите.
pub trait ReferenceSource: Send + Sync {
    fn generate(&self) -> String;
}

/// Случайные номера из системного CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomReferences;

impl ReferenceSource for RandomReferences {
    fn generate(&self) -> String {
        let mut rng = OsRng;
        (0..REFERENCE_LENGTH)
            .map(|_| REFERENCE_ALPHABET[rng.gen_range(0..REFERENCE_ALPHABET.len())] as char)
            .collect()
    }
}

pub fn is_valid_reference(reference: &str) -> bool {
    reference.len() == REFERENCE_LENGTH
        && reference.bytes().all(|b| REFERENCE_ALPHABET.contains(&b))
}
