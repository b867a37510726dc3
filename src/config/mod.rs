use serde::Deserialize;
use std::env;
use std::str::FromStr;
use thiserror::Error;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub booking: BookingConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub acquire_timeout_seconds: u64,
}

// Настройки Redis. Без REDIS_URL кеш доступности просто выключен
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub availability_ttl_seconds: u64,
}

// Правила бронирования
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    /// Максимум мест в одном запросе на бронирование. `None` - без ограничения,
    /// тогда запрос упирается только в свободные места сеанса.
    pub max_seats_per_booking: Option<usize>,
    /// Сколько раз перегенерировать номер брони при коллизии.
    pub reference_attempts: u32,
    /// `lock_timeout` транзакции бронирования, мс.
    pub lock_timeout_ms: u64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            max_seats_per_booking: None,
            reference_attempts: 3,
            lock_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

fn var_or(name: &'static str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

// Пустое значение и 0 означают "без ограничения"
fn optional_limit(name: &'static str) -> Result<Option<usize>, ConfigError> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => match value.trim().parse::<usize>() {
            Ok(0) => Ok(None),
            Ok(limit) => Ok(Some(limit)),
            Err(_) => Err(ConfigError::Invalid { name, value }),
        },
        Err(_) => Ok(None),
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = var_or(name, default);
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = BookingConfig::default();

        let config = Config {
            app: AppConfig {
                host: var_or("HOST", "0.0.0.0"),
                port: parse_or("PORT", "8000")?,
                environment: var_or("ENVIRONMENT", "development"),
                rust_log: var_or("RUST_LOG", "cinema_booking=debug,tower_http=debug"),
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                pool_size: parse_or("DB_POOL_SIZE", "20")?,
                acquire_timeout_seconds: parse_or("DB_ACQUIRE_TIMEOUT_SECONDS", "5")?,
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
                availability_ttl_seconds: parse_or("AVAILABILITY_CACHE_TTL_SECONDS", "30")?,
            },
            booking: BookingConfig {
                max_seats_per_booking: optional_limit("MAX_SEATS_PER_BOOKING")?,
                reference_attempts: parse_or(
                    "REFERENCE_ATTEMPTS",
                    &defaults.reference_attempts.to_string(),
                )?,
                lock_timeout_ms: parse_or(
                    "BOOKING_LOCK_TIMEOUT_MS",
                    &defaults.lock_timeout_ms.to_string(),
                )?,
            },
        };

        if config.booking.reference_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "REFERENCE_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        Ok(config)
    }

    /// Конфигурация для тестов и локального запуска без окружения.
    pub fn for_tests() -> Self {
        Config {
            app: AppConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                environment: "test".to_string(),
                rust_log: "cinema_booking=debug".to_string(),
            },
            database: DatabaseConfig {
                url: String::new(),
                pool_size: 1,
                acquire_timeout_seconds: 1,
            },
            redis: RedisConfig {
                url: None,
                availability_ttl_seconds: 30,
            },
            booking: BookingConfig::default(),
        }
    }
}
