pub mod builds;
pub mod health;

use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::hub::server::router())
        .nest("/api/v1", builds::router())
}
