use std::{collections::HashMap, time::Duration};

use chrono::Utc;
use rand::{seq::SliceRandom, Rng};
use tracing::info;

use crate::{
    error::{LobbyErr, LobbyResult},
    lobby::{
        model::{GameState, Player, Room, RoundResult, SettingsPatch, Winner},
        registry::RoomRegistry,
    },
    utils::timer::{ExpiryTx, RoundTimers},
};

pub const WORDS: &[&str] = &[
    "Apple", "Banana", "Computer", "Elephant", "Guitar", "Moon", "Pizza",
];

/// What is left after a player walks out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Departure {
    /// Room still has players; `result` is set when the departure ended the round.
    Remaining { result: Option<RoundResult> },
    /// Last player left, room is gone.
    Closed,
}

/// Game rules over a room registry. Every method runs to completion without
/// yielding, so callers holding the lobby lock see each transition atomically.
pub struct Lobby {
    rooms:  RoomRegistry,
    timers: RoundTimers,
}

impl Lobby {
    pub fn new(expiry_tx: ExpiryTx) -> Self {
        Self { rooms: RoomRegistry::default(), timers: RoundTimers::new(expiry_tx) }
    }

    pub fn room(&self, room_id: &str) -> LobbyResult<&Room> {
        self.rooms.get(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn create_room(&mut self, host_id: &str, conn: &str, name: &str) -> &Room {
        let id = self.rooms.unique_id();
        let host = Player { id: host_id.into(), conn: conn.into(), name: name.into() };
        info!(room = %id, host = host_id, "room created");
        self.rooms.create(id.clone(), Room::new(id, host))
    }

    pub fn join_room(
        &mut self,
        room_id: &str,
        player_id: &str,
        conn: &str,
        name: &str,
    ) -> LobbyResult<&Room> {
        let room = self.rooms.get_mut(room_id)?;

        if let Some(p) = room.players.iter_mut().find(|p| p.id == player_id) {
            p.conn = conn.into();
            p.name = name.into();
            info!(room = room_id, player = player_id, "player rebound");
            return Ok(&*room);
        }
        if room.players.len() >= room.settings.max_players as usize {
            return Err(LobbyErr::RoomFull);
        }
        room.players.push(Player { id: player_id.into(), conn: conn.into(), name: name.into() });
        info!(room = room_id, player = player_id, count = room.players.len(), "player joined");
        Ok(&*room)
    }

    /// Remove `player_id`. Their ballot and any ballot naming them are
    /// dropped; the round resolves early if that completes it.
    pub fn leave_room(&mut self, room_id: &str, player_id: &str) -> LobbyResult<Departure> {
        let room = self.rooms.get_mut(room_id)?;
        if !room.has_player(player_id) {
            return Ok(Departure::Remaining { result: None });
        }

        room.players.retain(|p| p.id != player_id);
        room.votes.remove(player_id);
        room.votes.retain(|_, target| *target != player_id);

        if room.players.is_empty() {
            self.rooms.delete(room_id);
            self.timers.cancel(room_id);
            info!(room = room_id, "room closed");
            return Ok(Departure::Closed);
        }

        if room.host_id == player_id {
            room.host_id = room.players[0].id.clone();
            info!(room = room_id, host = %room.host_id, "host reassigned");
        }

        let mut result = None;
        if room.is_imposter(player_id) {
            if room.game_state == GameState::Playing {
                result = Some(finish(room, Winner::Civilians));
            }
            room.imposter_id = None;
            room.word = None;
        } else if room.game_state == GameState::Playing && room.all_voted() {
            let winner = tally(&room.votes, room.imposter_id.as_deref());
            result = Some(finish(room, winner));
        }
        if result.is_some() {
            self.timers.cancel(room_id);
        }
        info!(room = room_id, player = player_id, "player left");
        Ok(Departure::Remaining { result })
    }

    pub fn start_game(&mut self, room_id: &str, player_id: &str) -> LobbyResult<&Room> {
        let room = self.rooms.get_mut(room_id)?;
        if room.host_id != player_id {
            return Err(LobbyErr::NotHost);
        }
        if room.players.len() < 2 {
            return Err(LobbyErr::InsufficientPlayers);
        }
        // deadline first: nothing below may fail
        let limit = if room.settings.time_limit_enabled {
            let secs = room.settings.time_limit_duration;
            let end_time = i64::try_from(secs)
                .ok()
                .and_then(chrono::Duration::try_seconds)
                .and_then(|d| Utc::now().checked_add_signed(d))
                .ok_or_else(|| LobbyErr::InvalidSettings("timeLimitDuration out of range".into()))?;
            Some((end_time, Duration::from_secs(secs)))
        } else {
            None
        };

        let mut rng = rand::thread_rng();
        let imposter = rng.gen_range(0..room.players.len());
        room.word = WORDS.choose(&mut rng).copied();
        room.imposter_id = Some(room.players[imposter].id.clone());
        room.votes.clear();
        room.game_state = GameState::Playing;
        room.round += 1;

        self.timers.cancel(room_id);
        room.end_time = limit.map(|(end_time, _)| end_time);
        if let Some((_, after)) = limit {
            self.timers.arm(room_id, room.round, after);
        }

        info!(room = room_id, round = room.round, players = room.players.len(), "round started");
        Ok(&*room)
    }

    /// Record a ballot. Returns the result once every player has voted.
    pub fn vote(
        &mut self,
        room_id: &str,
        voter_id: &str,
        target_id: &str,
    ) -> LobbyResult<Option<RoundResult>> {
        let room = self.rooms.get_mut(room_id)?;
        if room.game_state != GameState::Playing {
            return Err(LobbyErr::GameNotInProgress);
        }
        if !room.has_player(voter_id) || !room.has_player(target_id) {
            return Err(LobbyErr::NotInRoom);
        }

        room.votes.insert(voter_id.into(), target_id.into());
        if !room.all_voted() {
            return Ok(None);
        }

        let winner = tally(&room.votes, room.imposter_id.as_deref());
        let result = finish(room, winner);
        self.timers.cancel(room_id);
        Ok(Some(result))
    }

    /// Timer path: settle with whatever ballots are in. A room that is gone or
    /// already finished yields `None`.
    pub fn handle_game_timeout(&mut self, room_id: &str) -> Option<RoundResult> {
        let room = self.rooms.get_mut(room_id).ok()?;
        if room.game_state != GameState::Playing {
            return None;
        }
        let winner = tally(&room.votes, room.imposter_id.as_deref());
        let result = finish(room, winner);
        self.timers.cancel(room_id);
        info!(room = room_id, votes = room.votes.len(), "round timed out");
        Some(result)
    }

    /// Like `handle_game_timeout`, but only for the round the timer was armed for.
    pub fn expire_round(&mut self, room_id: &str, round: u32) -> Option<RoundResult> {
        let current = self.rooms.get(room_id).ok()?.round;
        if current != round {
            tracing::debug!(room = room_id, round, current, "stale round timer ignored");
            return None;
        }
        self.handle_game_timeout(room_id)
    }

    pub fn update_settings(
        &mut self,
        room_id: &str,
        host_id: &str,
        patch: &SettingsPatch,
    ) -> LobbyResult<&Room> {
        let room = self.rooms.get_mut(room_id)?;
        if room.host_id != host_id {
            return Err(LobbyErr::NotHost);
        }
        room.settings = room.settings.merged(patch)?;
        info!(room = room_id, settings = ?room.settings, "settings updated");
        Ok(&*room)
    }

    #[cfg(test)]
    pub(crate) fn timer_armed(&self, room_id: &str) -> bool {
        self.timers.is_armed(room_id)
    }
}

fn finish(room: &mut Room, winner: Winner) -> RoundResult {
    room.game_state = GameState::Finished;
    room.end_time = None;
    let result = RoundResult {
        winner,
        imposter_id: room.imposter_id.clone().unwrap_or_default(),
    };
    info!(room = %room.id, round = room.round, winner = ?winner, "round resolved");
    result
}

/// Civilians win only when a single target holds the strict maximum and that
/// target is the imposter. Ties and empty ballots go to the imposter.
pub fn tally(votes: &HashMap<String, String>, imposter_id: Option<&str>) -> Winner {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for target in votes.values() {
        *counts.entry(target.as_str()).or_default() += 1;
    }
    let Some(top) = counts.values().copied().max() else {
        return Winner::Imposter;
    };
    let mut leaders = counts.iter().filter(|(_, &n)| n == top).map(|(&t, _)| t);
    match (leaders.next(), leaders.next()) {
        (Some(target), None) if Some(target) == imposter_id => Winner::Civilians,
        _ => Winner::Imposter,
    }
}
