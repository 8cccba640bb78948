use std::sync::Arc;

use axum::{
    extract::{ws::{Message, WebSocket, WebSocketUpgrade}, Extension, Query},
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::{bad, AppResult, LobbyErr},
    lobby::{model::ConnId, Departure},
    protocol::{ClientEvent, Envelope, Reply, RoleCard},
    state::{Outbox, SharedHub},
    utils::{jwt::{self, Identity}, timer::ExpiryRx},
};

#[derive(Deserialize)] struct WsQuery { token: Option<String> }

pub fn router() -> Router {
    Router::new().route("/lobby", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(q): Query<WsQuery>,
    Extension(cfg): Extension<Arc<Config>>,
    Extension(hub): Extension<SharedHub>,
) -> AppResult<impl IntoResponse> {
    let identity = match (q.token.as_deref(), cfg.jwt_secret.as_deref()) {
        (Some(token), Some(secret)) => Some(jwt::verify(token, secret).ok_or_else(|| bad("bad token"))?),
        _ if cfg.require_auth => return Err(bad("missing token")),
        _ => None,
    };
    Ok(ws.on_upgrade(move |s| user_ws(s, hub, identity)))
}

/* ---------------- per socket ---------------- */
async fn user_ws(sock: WebSocket, hub: SharedHub, identity: Option<Identity>) {
    let conn = uuid::Uuid::new_v4().to_string();
    let (mut sink, mut stream) = sock.split();
    let (out, mut out_rx) = mpsc::unbounded_channel::<String>();
    hub.lock().await.attach(&conn, out.clone());
    info!(conn = %conn, user = ?identity.as_ref().map(|i| &i.user_id), "client connected");

    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if sink.send(Message::Text(msg)).await.is_err() { break; }
        }
    });

    let session = Session::new(conn.clone(), identity, out);
    while let Some(Ok(frame)) = stream.next().await {
        match frame {
            Message::Text(raw) => {
                let reply = dispatch(&hub, &session, &raw).await;
                session.out.send(reply).ok();
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // players stay in their rooms; a later joinRoom rebinds them
    hub.lock().await.detach(&conn);
    writer.abort();
    info!(conn = %conn, "client disconnected");
}

/// Per-socket state: who it is and where its frames go.
pub struct Session {
    conn:     ConnId,
    identity: Option<Identity>,
    out:      Outbox,
}

impl Session {
    pub fn new(conn: ConnId, identity: Option<Identity>, out: Outbox) -> Self {
        Self { conn, identity, out }
    }

    /// A verified token pins the user id; otherwise the claim is trusted.
    fn user(&self, claimed: &str) -> Result<String, String> {
        match &self.identity {
            Some(id) if id.user_id != claimed => Err("Identity mismatch".into()),
            _ => Ok(claimed.to_owned()),
        }
    }

    fn display_name(&self, given: Option<String>, user_id: &str) -> String {
        given
            .filter(|n| !n.trim().is_empty())
            .or_else(|| self.identity.as_ref().and_then(|i| i.name.clone()))
            .unwrap_or_else(|| user_id.to_owned())
    }
}

/// Handle one inbound frame and return the acknowledgment to send back.
pub async fn dispatch(hub: &SharedHub, session: &Session, raw: &str) -> String {
    let env: Envelope = match serde_json::from_str(raw) {
        Ok(env) => env,
        Err(e)  => return Reply::error(None, format!("Malformed message: {e}")).to_text(),
    };
    let (ack, event) = (env.ack, env.event);

    let outcome = match ClientEvent::parse(&event, env.data) {
        Ok(ev)   => handle(hub, session, ev).await,
        Err(msg) => Err(msg),
    };
    let reply = match outcome {
        Ok((kind, data)) => Reply { ack, kind, data },
        Err(msg) => {
            warn!(conn = %session.conn, event = %event, error = %msg, "event rejected");
            Reply::error(ack, msg)
        }
    };
    reply.to_text()
}

type Handled = Result<(&'static str, Value), String>;

fn client_err(e: LobbyErr) -> String { e.to_string() }

/// Engine call and fan-out happen under one lock, so every socket queues
/// room events in the order the engine produced them.
async fn handle(hub: &SharedHub, session: &Session, ev: ClientEvent) -> Handled {
    match ev {
        ClientEvent::CreateRoom(p) => {
            let user = session.user(&p.user_id)?;
            let name = session.display_name(p.name, &user);
            let mut hub = hub.lock().await;
            let room_id = hub.lobby.create_room(&user, &session.conn, &name).id.clone();
            hub.subscribe(&room_id, &session.conn);
            Ok(("roomCreated", json!({ "id": room_id })))
        }

        ClientEvent::JoinRoom(p) => {
            let user = session.user(&p.user_id)?;
            let name = session.display_name(p.name, &user);
            let mut hub = hub.lock().await;
            let room = hub.lobby.join_room(&p.room_id, &user, &session.conn, &name).map_err(client_err)?;
            let view = json!(room.view());
            hub.subscribe(&p.room_id, &session.conn);
            hub.broadcast(&p.room_id, "playerJoined", &view);
            Ok(("roomJoined", view))
        }

        ClientEvent::LeaveRoom(p) => {
            let user = session.user(&p.user_id)?;
            let mut hub = hub.lock().await;
            hub.unsubscribe(&p.room_id, &session.conn);

            let left = hub.lobby.leave_room(&p.room_id, &user);
            match left {
                Ok(Departure::Closed) => hub.close_room(&p.room_id),
                Ok(Departure::Remaining { result }) => {
                    if let Ok(room) = hub.lobby.room(&p.room_id) {
                        let view = json!(room.view());
                        hub.broadcast(&p.room_id, "playerLeft", view);
                    }
                    if let Some(result) = result {
                        hub.broadcast(&p.room_id, "gameEnded", result);
                    }
                }
                Err(e) => debug!(room = %p.room_id, error = %e, "leave for unknown room"),
            }
            Ok(("leftRoom", json!({ "roomId": p.room_id })))
        }

        ClientEvent::StartGame(p) => {
            let user = session.user(&p.user_id)?;
            let mut hub = hub.lock().await;
            let cards: Vec<(ConnId, RoleCard)> = {
                let room = hub.lobby.start_game(&p.room_id, &user).map_err(client_err)?;
                let word = room.word.unwrap_or_default();
                room.players
                    .iter()
                    .map(|pl| {
                        let card = RoleCard::new(room.game_state, room.is_imposter(&pl.id), word, room.end_time);
                        (pl.conn.clone(), card)
                    })
                    .collect()
            };
            for (conn, card) in cards {
                hub.unicast(&conn, "gameStarted", card);
            }
            Ok(("gameStarted", json!({ "success": true })))
        }

        ClientEvent::Vote(p) => {
            let user = session.user(&p.user_id)?;
            let mut hub = hub.lock().await;
            let result = hub.lobby
                .vote(&p.room_id, &user, &p.target_id)
                .map_err(client_err)?;
            if let Some(result) = result {
                hub.broadcast(&p.room_id, "gameEnded", result);
            }
            Ok(("voteAccepted", json!({ "success": true })))
        }

        ClientEvent::UpdateSettings(p) => {
            let user = session.user(&p.user_id)?;
            let mut hub = hub.lock().await;
            let settings = hub.lobby
                .update_settings(&p.room_id, &user, &p.settings)
                .map_err(client_err)?
                .settings;
            hub.broadcast(&p.room_id, "settingsUpdated", settings);
            Ok(("settingsUpdated", json!({ "success": true })))
        }
    }
}

/// Settles timed rounds as their timers fire.
pub async fn expiry_task(hub: SharedHub, mut rx: ExpiryRx) {
    while let Some(exp) = rx.recv().await {
        let mut hub = hub.lock().await;
        let result = hub.lobby.expire_round(&exp.room_id, exp.round);
        match result {
            Some(result) => {
                info!(room = %exp.room_id, round = exp.round, "round expired");
                hub.broadcast(&exp.room_id, "gameEnded", result);
            }
            None => debug!(room = %exp.room_id, round = exp.round, "expiry after round already settled"),
        }
    }
}
