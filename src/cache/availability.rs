use crate::cache::CacheService;
use crate::store::SessionAvailability;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, warn};

/// Пауза перед повторной инвалидацией после записи. Чтение, которое успело взять
/// снимок до коммита и положить его в кеш уже после первой инвалидации, живёт
/// не дольше этой паузы.
pub const REINVALIDATE_DELAY: Duration = Duration::from_millis(500);

fn availability_key(session_id: i64) -> String {
    format!("availability:{}", session_id)
}

impl CacheService {
    /// Закешированный снимок доступности. Ошибки Redis считаются промахом.
    pub async fn get_availability(&self, session_id: i64) -> Option<SessionAvailability> {
        let redis = self.redis.as_ref()?;
        let mut conn = redis.conn.clone();

        let data = match conn.get::<_, Option<String>>(availability_key(session_id)).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to read availability cache for session {}: {:?}", session_id, e);
                return None;
            }
        };

        match serde_json::from_str(&data?) {
            Ok(availability) => Some(availability),
            Err(e) => {
                warn!("Dropping unreadable availability cache for session {}: {:?}", session_id, e);
                self.invalidate_availability(session_id).await;
                None
            }
        }
    }

    pub async fn store_availability(&self, availability: &SessionAvailability) {
        let Some(redis) = self.redis.as_ref() else {
            return;
        };
        let data = match serde_json::to_string(availability) {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to serialize availability: {:?}", e);
                return;
            }
        };

        let mut conn = redis.conn.clone();
        let result: Result<(), redis::RedisError> = conn
            .set_ex(
                availability_key(availability.session_id),
                data,
                self.availability_ttl_seconds,
            )
            .await;
        if let Err(e) = result {
            warn!("Failed to cache availability for session {}: {:?}", availability.session_id, e);
        }
    }

    /// Вызывается после каждой успешной брони или отмены: удаляет снимок сразу
    /// и ещё раз через `REINVALIDATE_DELAY` в фоне.
    pub async fn invalidate_availability_after_write(&self, session_id: i64) {
        if !self.is_enabled() {
            return;
        }
        self.invalidate_availability(session_id).await;

        let cache = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(REINVALIDATE_DELAY).await;
            cache.invalidate_availability(session_id).await;
        });
    }

    pub async fn invalidate_availability(&self, session_id: i64) {
        let Some(redis) = self.redis.as_ref() else {
            return;
        };
        let mut conn = redis.conn.clone();
        let result: Result<(), redis::RedisError> = conn.del(availability_key(session_id)).await;
        match result {
            Ok(()) => debug!("Invalidated availability cache for session {}", session_id),
            Err(e) => warn!("Failed to invalidate availability cache for session {}: {:?}", session_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_cache_always_misses() {
        let cache = CacheService::disabled();
        assert!(!cache.is_enabled());

        let availability = SessionAvailability {
            session_id: 4,
            hall_id: 1,
            total_seats: 10,
            available_seats: 10,
            reserved_tickets: 0,
            is_sold_out: false,
            taken_seats: vec![],
        };
        cache.store_availability(&availability).await;
        assert_eq!(cache.get_availability(4).await, None);
        cache.invalidate_availability(4).await;
    }

    fn snapshot(session_id: i64, available_seats: i32) -> SessionAvailability {
        SessionAvailability {
            session_id,
            hall_id: 1,
            total_seats: 10,
            available_seats,
            reserved_tickets: 10 - available_seats,
            is_sold_out: available_seats == 0,
            taken_seats: vec![],
        }
    }

    // Нужен живой Redis: без REDIS_URL тест ничего не проверяет
    #[tokio::test]
    async fn late_stale_snapshot_is_evicted_after_write() {
        let Ok(url) = std::env::var("REDIS_URL") else {
            return;
        };
        let redis = crate::redis_client::RedisClient::new(&url).await.unwrap();
        let cache = CacheService::new(redis, 60);
        let session_id = 900_000 + i64::from(std::process::id() % 1000);

        cache.store_availability(&snapshot(session_id, 10)).await;
        cache.invalidate_availability_after_write(session_id).await;
        assert_eq!(cache.get_availability(session_id).await, None);

        // читатель, начавший до коммита, кладёт старый снимок уже после инвалидации
        cache.store_availability(&snapshot(session_id, 10)).await;
        assert!(cache.get_availability(session_id).await.is_some());

        tokio::time::sleep(REINVALIDATE_DELAY + Duration::from_millis(200)).await;
        assert_eq!(cache.get_availability(session_id).await, None);
    }

    #[tokio::test]
    async fn write_invalidation_is_noop_without_redis() {
        let cache = CacheService::disabled();
        cache.invalidate_availability_after_write(4).await;
        assert_eq!(cache.get_availability(4).await, None);
    }

    #[test]
    fn keys_are_per_session() {
        assert_eq!(availability_key(17), "availability:17");
    }
}
