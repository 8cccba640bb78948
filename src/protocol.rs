//! Wire format of the lobby socket.
//!
//! client  → `{"event": "joinRoom", "ack": 7, "data": {...}}`
//! ack     ← `{"ack": 7, "type": "roomJoined", "data": {...}}`
//! push    ← `{"event": "playerJoined", "data": {...}}`
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::lobby::{GameState, SettingsPatch};

pub const IMPOSTER_SECRET: &str = "YOU ARE THE IMPOSTER";

#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub ack:   Option<u64>,
    #[serde(default)]
    pub data:  Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoom {
    pub user_id: String,
    #[serde(default)]
    pub name:    Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    pub room_id: String,
    pub user_id: String,
    #[serde(default)]
    pub name:    Option<String>,
}

/// Shared by `leaveRoom` and `startGame`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAction {
    pub room_id: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub room_id:   String,
    pub user_id:   String,
    pub target_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettings {
    pub room_id:  String,
    pub user_id:  String,
    #[serde(default)]
    pub settings: SettingsPatch,
}

#[derive(Debug)]
pub enum ClientEvent {
    CreateRoom(CreateRoom),
    JoinRoom(JoinRoom),
    LeaveRoom(RoomAction),
    StartGame(RoomAction),
    Vote(Vote),
    UpdateSettings(UpdateSettings),
}

impl ClientEvent {
    pub fn parse(event: &str, data: Value) -> Result<Self, String> {
        fn body<T: DeserializeOwned>(event: &str, data: Value) -> Result<T, String> {
            serde_json::from_value(data).map_err(|e| format!("Bad {event} payload: {e}"))
        }
        Ok(match event {
            "createRoom"     => Self::CreateRoom(body(event, data)?),
            "joinRoom"       => Self::JoinRoom(body(event, data)?),
            "leaveRoom"      => Self::LeaveRoom(body(event, data)?),
            "startGame"      => Self::StartGame(body(event, data)?),
            "vote"           => Self::Vote(body(event, data)?),
            "updateSettings" => Self::UpdateSettings(body(event, data)?),
            other            => return Err(format!("Unknown event: {other}")),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct Reply {
    pub ack:  Option<u64>,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: Value,
}

impl Reply {
    pub fn error(ack: Option<u64>, msg: impl Into<String>) -> Self {
        Self { ack, kind: "error", data: Value::String(msg.into()) }
    }

    pub fn to_text(&self) -> String {
        json!(self).to_string()
    }
}

/// Server-initiated frame.
pub fn push<T: Serialize>(event: &str, data: T) -> String {
    json!({ "event": event, "data": data }).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Imposter,
    Civilian,
}

/// Private `gameStarted` payload, one per player.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleCard {
    pub game_state: GameState,
    pub role:       Role,
    pub secret:     String,
    #[serde(with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
    pub end_time:   Option<DateTime<Utc>>,
}

impl RoleCard {
    pub fn new(game_state: GameState, imposter: bool, word: &str, end_time: Option<DateTime<Utc>>) -> Self {
        let (role, secret) = if imposter {
            (Role::Imposter, IMPOSTER_SECRET.to_string())
        } else {
            (Role::Civilian, format!("Secret Word: {word}"))
        };
        Self { game_state, role, secret, end_time }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_events() {
        let env: Envelope = serde_json::from_str(
            r#"{"event":"vote","ack":3,"data":{"roomId":"R","userId":"a","targetId":"b"}}"#,
        )
        .unwrap();
        assert_eq!(env.ack, Some(3));
        match ClientEvent::parse(&env.event, env.data).unwrap() {
            ClientEvent::Vote(v) => assert_eq!((v.room_id.as_str(), v.target_id.as_str()), ("R", "b")),
            other => panic!("wrong event {other:?}"),
        }
    }

    #[test]
    fn settings_patch_may_be_partial() {
        let ev = ClientEvent::parse(
            "updateSettings",
            json!({"roomId": "R", "userId": "a", "settings": {"imposterCount": 2}}),
        )
        .unwrap();
        let ClientEvent::UpdateSettings(u) = ev else { panic!("wrong event") };
        assert_eq!(u.settings.imposter_count, Some(2));
        assert_eq!(u.settings.max_players, None);
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert_eq!(ClientEvent::parse("dance", Value::Null).unwrap_err(), "Unknown event: dance");
        let err = ClientEvent::parse("joinRoom", json!({"userId": "a"})).unwrap_err();
        assert!(err.starts_with("Bad joinRoom payload"), "{err}");
    }

    #[test]
    fn reply_shape() {
        let v: Value = serde_json::from_str(&Reply::error(Some(9), "Room not found").to_text()).unwrap();
        assert_eq!(v, json!({"ack": 9, "type": "error", "data": "Room not found"}));
    }

    #[test]
    fn role_cards() {
        let civ = serde_json::to_value(RoleCard::new(GameState::Playing, false, "Moon", None)).unwrap();
        assert_eq!(civ, json!({"gameState": "playing", "role": "civilian", "secret": "Secret Word: Moon"}));

        let end = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let imp = serde_json::to_value(RoleCard::new(GameState::Playing, true, "Moon", Some(end))).unwrap();
        assert_eq!(imp["role"], "imposter");
        assert_eq!(imp["secret"], IMPOSTER_SECRET);
        assert_eq!(imp["endTime"], 1_700_000_000_000i64);
    }
}
