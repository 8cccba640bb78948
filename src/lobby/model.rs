use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LobbyErr, LobbyResult};

/// Transport handle of one WebSocket connection.
pub type ConnId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    Waiting,
    Playing,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSettings {
    pub max_players:         u32,
    pub imposter_count:      u32,
    pub time_limit_enabled:  bool,
    /// seconds
    pub time_limit_duration: u64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            max_players:         8,
            imposter_count:      1,
            time_limit_enabled:  false,
            time_limit_duration: 60,
        }
    }
}

impl GameSettings {
    pub const MIN_PLAYERS:    u32 = 2;
    pub const MIN_TIME_LIMIT: u64 = 10;
    pub const MAX_TIME_LIMIT: u64 = 3600;

    /// Overlay `patch` on a copy of `self` and validate the merged result.
    pub fn merged(&self, patch: &SettingsPatch) -> LobbyResult<GameSettings> {
        let next = GameSettings {
            max_players:         patch.max_players.unwrap_or(self.max_players),
            imposter_count:      patch.imposter_count.unwrap_or(self.imposter_count),
            time_limit_enabled:  patch.time_limit_enabled.unwrap_or(self.time_limit_enabled),
            time_limit_duration: patch.time_limit_duration.unwrap_or(self.time_limit_duration),
        };
        next.validate()?;
        Ok(next)
    }

    pub fn validate(&self) -> LobbyResult<()> {
        let invalid = |why: &str| Err(LobbyErr::InvalidSettings(why.into()));
        if self.max_players < Self::MIN_PLAYERS {
            return invalid("maxPlayers must be at least 2");
        }
        if self.imposter_count < 1 {
            return invalid("imposterCount must be at least 1");
        }
        if self.imposter_count >= self.max_players {
            return invalid("imposterCount must be less than maxPlayers");
        }
        if self.time_limit_duration < Self::MIN_TIME_LIMIT {
            return invalid("timeLimitDuration must be at least 10 seconds");
        }
        if self.time_limit_duration > Self::MAX_TIME_LIMIT {
            return invalid("timeLimitDuration must be at most 3600 seconds");
        }
        Ok(())
    }
}

/// Partial settings as sent by the host; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub max_players:         Option<u32>,
    pub imposter_count:      Option<u32>,
    pub time_limit_enabled:  Option<bool>,
    pub time_limit_duration: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Player {
    pub id:   String,
    #[serde(skip)]
    pub conn: ConnId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Imposter,
    Civilians,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    pub winner:      Winner,
    pub imposter_id: String,
}

#[derive(Debug, Clone)]
pub struct Room {
    pub id:          String,
    pub host_id:     String,
    pub players:     Vec<Player>,              // arrival order
    pub game_state:  GameState,
    pub settings:    GameSettings,
    pub word:        Option<&'static str>,
    pub imposter_id: Option<String>,
    pub votes:       HashMap<String, String>,  // voter -> target
    pub end_time:    Option<DateTime<Utc>>,
    pub created_at:  DateTime<Utc>,
    pub round:       u32,
}

impl Room {
    pub fn new(id: String, host: Player) -> Self {
        Self {
            id,
            host_id:     host.id.clone(),
            players:     vec![host],
            game_state:  GameState::Waiting,
            settings:    GameSettings::default(),
            word:        None,
            imposter_id: None,
            votes:       HashMap::new(),
            end_time:    None,
            created_at:  Utc::now(),
            round:       0,
        }
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn has_player(&self, id: &str) -> bool {
        self.player(id).is_some()
    }

    pub fn is_imposter(&self, id: &str) -> bool {
        self.imposter_id.as_deref() == Some(id)
    }

    pub fn all_voted(&self) -> bool {
        !self.players.is_empty() && self.votes.len() == self.players.len()
    }

    /// Public snapshot for broadcasts; never carries the word, the imposter
    /// or vote targets.
    pub fn view(&self) -> RoomView<'_> {
        RoomView {
            id:         &self.id,
            host_id:    &self.host_id,
            players:    &self.players,
            game_state: self.game_state,
            settings:   self.settings,
            voted:      self
                .players
                .iter()
                .filter(|p| self.votes.contains_key(&p.id))
                .map(|p| p.id.as_str())
                .collect(),
            end_time:   self.end_time,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView<'a> {
    pub id:         &'a str,
    pub host_id:    &'a str,
    pub players:    &'a [Player],
    pub game_state: GameState,
    pub settings:   GameSettings,
    pub voted:      Vec<&'a str>,
    #[serde(with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
    pub end_time:   Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn player(id: &str) -> Player {
        Player { id: id.into(), conn: format!("conn-{id}"), name: id.to_uppercase() }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(GameSettings::default().validate().is_ok());
    }

    #[test]
    fn merge_keeps_unset_fields() {
        let base = GameSettings::default();
        let patch = SettingsPatch { time_limit_enabled: Some(true), ..Default::default() };
        let next = base.merged(&patch).unwrap();
        assert!(next.time_limit_enabled);
        assert_eq!(next.max_players, 8);
        assert_eq!(next.time_limit_duration, 60);
    }

    #[test]
    fn merge_rejects_each_bound() {
        let base = GameSettings::default();
        let cases = [
            SettingsPatch { max_players: Some(1), imposter_count: Some(0), ..Default::default() },
            SettingsPatch { imposter_count: Some(0), ..Default::default() },
            SettingsPatch { imposter_count: Some(8), ..Default::default() },
            SettingsPatch { max_players: Some(3), imposter_count: Some(3), ..Default::default() },
            SettingsPatch { time_limit_duration: Some(9), ..Default::default() },
            SettingsPatch { time_limit_duration: Some(3601), ..Default::default() },
            SettingsPatch { time_limit_duration: Some(10_000_000_000_000), ..Default::default() },
        ];
        for patch in cases {
            assert!(
                matches!(base.merged(&patch), Err(LobbyErr::InvalidSettings(_))),
                "accepted {patch:?}"
            );
        }
    }

    #[test]
    fn patch_reads_camel_case() {
        let patch: SettingsPatch =
            serde_json::from_value(json!({"maxPlayers": 5, "timeLimitDuration": 30})).unwrap();
        assert_eq!(patch.max_players, Some(5));
        assert_eq!(patch.time_limit_duration, Some(30));
        assert_eq!(patch.imposter_count, None);
    }

    #[test]
    fn view_hides_secrets() {
        let mut room = Room::new("ABC123".into(), player("a"));
        room.players.push(player("b"));
        room.game_state = GameState::Playing;
        room.word = Some("Moon");
        room.imposter_id = Some("b".into());
        room.votes.insert("b".into(), "a".into());

        let v = serde_json::to_value(room.view()).unwrap();
        assert_eq!(v["hostId"], "a");
        assert_eq!(v["gameState"], "playing");
        assert_eq!(v["players"], json!([{"id": "a", "name": "A"}, {"id": "b", "name": "B"}]));
        assert_eq!(v["voted"], json!(["b"]));
        assert!(v.get("endTime").is_none());
        assert!(v["createdAt"].is_i64());
        assert!(v.get("imposterId").is_none());
        assert!(v.get("word").is_none());
        let text = v.to_string();
        assert!(!text.contains("Moon"));
        assert!(!text.contains("conn-"));
    }
}
