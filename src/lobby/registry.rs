use std::collections::{hash_map::Entry, HashMap};

use crate::{
    error::{LobbyErr, LobbyResult},
    lobby::model::Room,
};

/// Unambiguous upper-case alphabet for shareable room codes (no 0/O, 1/I).
const CODE_ALPHABET: [char; 32] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R',
    'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', '2', '3', '4', '5', '6', '7', '8', '9',
];
pub const CODE_LEN: usize = 6;

pub fn random_code() -> String {
    nanoid::nanoid!(CODE_LEN, &CODE_ALPHABET)
}

/// Owns every live room, keyed by room code.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
}

impl RoomRegistry {
    pub fn create(&mut self, id: String, room: Room) -> &mut Room {
        match self.rooms.entry(id) {
            Entry::Occupied(mut slot) => {
                slot.insert(room);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(room),
        }
    }

    pub fn get(&self, id: &str) -> LobbyResult<&Room> {
        self.rooms.get(id).ok_or(LobbyErr::RoomNotFound)
    }

    pub fn get_mut(&mut self, id: &str) -> LobbyResult<&mut Room> {
        self.rooms.get_mut(id).ok_or(LobbyErr::RoomNotFound)
    }

    pub fn delete(&mut self, id: &str) {
        self.rooms.remove(id);
    }

    pub fn exists(&self, id: &str) -> bool {
        self.rooms.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Draw codes from `gen` until one is free.
    pub fn unique_id_with(&self, mut gen: impl FnMut() -> String) -> String {
        loop {
            let code = gen();
            if !self.exists(&code) {
                return code;
            }
            tracing::debug!(code = %code, "room code collision, retrying");
        }
    }

    pub fn unique_id(&self) -> String {
        self.unique_id_with(random_code)
    }
}
