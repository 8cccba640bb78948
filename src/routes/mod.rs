use axum::Router;

pub mod health;
pub mod ws;

pub fn router() -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/ws",  ws::router())
}
