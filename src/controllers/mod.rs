pub mod error;
pub mod sessions;
pub mod tickets;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(tickets::routes())
        .merge(sessions::routes())
}
