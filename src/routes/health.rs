use axum::{routing::get, Extension, Json, Router};
use serde_json::{json, Value};

use crate::state::SharedHub;

pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

async fn health(Extension(hub): Extension<SharedHub>) -> Json<Value> {
    let rooms = hub.lock().await.lobby.room_count();
    Json(json!({ "status": "ok", "rooms": rooms }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lobby::Lobby, state::Hub};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[tokio::test]
    async fn reports_room_count() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let hub: SharedHub = Arc::new(Mutex::new(Hub::new(Lobby::new(tx))));
        hub.lock().await.lobby.create_room("a", "c1", "A");

        let Json(body) = health(Extension(hub)).await;
        assert_eq!(body, json!({ "status": "ok", "rooms": 1 }));
    }
}
