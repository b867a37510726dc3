use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use std::sync::Arc;

/// Заголовок, в который внешний слой аутентификации кладёт id пользователя.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Уже аутентифицированный пользователь, от имени которого идёт запрос.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
}

impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Пароли и токены проверяет шлюз, сюда приходит только его результат
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .ok_or((StatusCode::UNAUTHORIZED, "Не авторизован"))?;

        Ok(AuthUser { user_id })
    }
}
