use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use serde::Serialize;
use tokio::sync::{mpsc, Mutex};

use crate::{
    lobby::{model::ConnId, Lobby},
    protocol,
};

/// Outbound queue of one socket. Acks and pushes share it, so a socket
/// sees frames in the order they were queued.
pub type Outbox = mpsc::UnboundedSender<String>;

/* ------------ shared gateway state -------------- */
/// One writer at a time: a handler locks, runs a single engine call, queues
/// every frame that call produces, then releases.
pub type SharedHub = Arc<Mutex<Hub>>;

pub struct Hub {
    pub lobby: Lobby,
    conns:     HashMap<ConnId, Outbox>,
    members:   HashMap<String, HashSet<ConnId>>,  // room -> subscribed sockets
}

impl Hub {
    pub fn new(lobby: Lobby) -> Self {
        Self { lobby, conns: HashMap::new(), members: HashMap::new() }
    }

    pub fn attach(&mut self, conn: &str, out: Outbox) {
        self.conns.insert(conn.to_owned(), out);
    }

    /// Forget a socket and every room subscription it held.
    pub fn detach(&mut self, conn: &str) {
        self.conns.remove(conn);
        self.members.retain(|_, subs| {
            subs.remove(conn);
            !subs.is_empty()
        });
    }

    pub fn subscribe(&mut self, room_id: &str, conn: &str) {
        self.members.entry(room_id.to_owned()).or_default().insert(conn.to_owned());
    }

    pub fn unsubscribe(&mut self, room_id: &str, conn: &str) {
        if let Some(subs) = self.members.get_mut(room_id) {
            subs.remove(conn);
            if subs.is_empty() {
                self.members.remove(room_id);
            }
        }
    }

    pub fn close_room(&mut self, room_id: &str) {
        self.members.remove(room_id);
    }

    pub fn broadcast<T: Serialize>(&self, room_id: &str, event: &str, data: T) {
        let Some(subs) = self.members.get(room_id) else { return };
        let frame = protocol::push(event, data);
        for conn in subs {
            if let Some(out) = self.conns.get(conn) {
                // socket mid-teardown is fine
                out.send(frame.clone()).ok();
            }
        }
    }

    pub fn unicast<T: Serialize>(&self, conn: &str, event: &str, data: T) {
        match self.conns.get(conn) {
            Some(out) => { out.send(protocol::push(event, data)).ok(); }
            None      => tracing::debug!(conn, event, "unicast to gone socket dropped"),
        }
    }

    #[cfg(test)]
    pub fn has_subscribers(&self, room_id: &str) -> bool {
        self.members.contains_key(room_id)
    }
}
