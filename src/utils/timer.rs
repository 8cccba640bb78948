use std::{collections::HashMap, time::Duration};

use tokio::{
    sync::mpsc,
    task::AbortHandle,
    time,
};

/// Fired when a timed round runs out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiry {
    pub room_id: String,
    pub round:   u32,
}

pub type ExpiryTx = mpsc::UnboundedSender<Expiry>;
pub type ExpiryRx = mpsc::UnboundedReceiver<Expiry>;

/// At most one pending one-shot timer per room.
pub struct RoundTimers {
    tx:      ExpiryTx,
    pending: HashMap<String, AbortHandle>,
}

impl RoundTimers {
    pub fn new(tx: ExpiryTx) -> Self {
        Self { tx, pending: HashMap::new() }
    }

    /// Replace whatever is pending for `room_id` with a fresh timer.
    /// Needs a running tokio runtime.
    pub fn arm(&mut self, room_id: &str, round: u32, after: Duration) {
        self.cancel(room_id);

        let tx = self.tx.clone();
        let expiry = Expiry { room_id: room_id.to_owned(), round };
        let deadline = time::sleep(after);
        let task = tokio::spawn(async move {
            deadline.await;
            if tx.send(expiry).is_err() {
                tracing::debug!("expiry receiver gone");
            }
        });
        self.pending.insert(room_id.to_owned(), task.abort_handle());
        tracing::debug!(room = room_id, round, secs = after.as_secs(), "round timer armed");
    }

    pub fn cancel(&mut self, room_id: &str) {
        if let Some(h) = self.pending.remove(room_id) {
            h.abort();
        }
    }

    #[cfg(test)]
    pub fn is_armed(&self, room_id: &str) -> bool {
        self.pending.get(room_id).is_some_and(|h| !h.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = RoundTimers::new(tx);
        timers.arm("ROOM01", 1, Duration::from_secs(10));
        assert!(timers.is_armed("ROOM01"));

        time::advance(Duration::from_secs(9)).await;
        assert!(rx.try_recv().is_err());

        time::advance(Duration::from_secs(2)).await;
        assert_eq!(
            rx.recv().await,
            Some(Expiry { room_id: "ROOM01".into(), round: 1 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_replaces_previous_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = RoundTimers::new(tx);
        timers.arm("ROOM01", 1, Duration::from_secs(10));
        timers.arm("ROOM01", 2, Duration::from_secs(30));

        time::advance(Duration::from_secs(31)).await;
        assert_eq!(rx.recv().await.map(|e| e.round), Some(2));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_delivery() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = RoundTimers::new(tx);
        timers.arm("ROOM01", 1, Duration::from_secs(10));
        timers.cancel("ROOM01");
        assert!(!timers.is_armed("ROOM01"));

        time::advance(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }
}
