use axum::{http::StatusCode, response::IntoResponse};
use std::fmt::Display;

pub type AppResult<T> = Result<T, AppErr>;
pub type LobbyResult<T> = Result<T, LobbyErr>;

/* ── HTTP / process level ── */
#[derive(thiserror::Error, Debug)]
pub enum AppErr {
    #[error("Bad request: {0}")]
    Bad(String),
}

impl IntoResponse for AppErr {
    fn into_response(self) -> axum::response::Response {
        match self {
            AppErr::Bad(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
        }
    }
}

pub fn bad<E: Display>(e: E) -> AppErr { AppErr::Bad(e.to_string()) }

/* ── session engine ──
   Display text is what the client sees in `{type:"error"}`. */
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LobbyErr {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Only host can start game")]
    NotHost,

    #[error("Need at least 2 players")]
    InsufficientPlayers,

    #[error("Game is not in progress")]
    GameNotInProgress,

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Room is full")]
    RoomFull,

    #[error("Player is not in this room")]
    NotInRoom,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn bad_request_maps_to_400_with_reason() {
        let resp = bad("missing token").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"missing token");
    }

    #[test]
    fn lobby_messages_are_client_readable() {
        assert_eq!(LobbyErr::RoomNotFound.to_string(), "Room not found");
        assert_eq!(
            LobbyErr::InvalidSettings("maxPlayers must be at least 2".into()).to_string(),
            "Invalid settings: maxPlayers must be at least 2"
        );
    }
}
