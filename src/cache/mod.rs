use crate::redis_client::RedisClient;
use tracing::info;

pub mod availability;

/// Кеш снимков доступности сеансов.
///
/// Без Redis все операции становятся no-op, а чтение всегда идёт в хранилище.
#[derive(Clone)]
pub struct CacheService {
    redis: Option<RedisClient>,
    availability_ttl_seconds: u64,
}

impl CacheService {
    pub fn new(redis: RedisClient, availability_ttl_seconds: u64) -> Self {
        info!("Availability cache enabled, ttl {}s", availability_ttl_seconds);
        Self {
            redis: Some(redis),
            availability_ttl_seconds,
        }
    }

    pub fn disabled() -> Self {
        Self {
            redis: None,
            availability_ttl_seconds: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.redis.is_some()
    }
}
