mod config;
mod error;
mod lobby;
mod protocol;
mod state;
mod utils {
    pub mod jwt;
    pub mod timer;
}
mod routes;

use std::sync::Arc;

use anyhow::Context;
use axum::{http::{header::HeaderValue, Method}, Extension};
use tokio::sync::{mpsc, Mutex};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{config::Config, lobby::Lobby, state::{Hub, SharedHub}};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();
    let cfg = Config::load()?;

    let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
    let hub: SharedHub = Arc::new(Mutex::new(Hub::new(Lobby::new(expiry_tx))));
    tokio::spawn(routes::ws::expiry_task(hub.clone(), expiry_rx));  // 計時回合收尾

    let origin: HeaderValue = cfg.frontend_url.parse()
        .with_context(|| format!("FRONTEND_URL is not a valid origin: {}", cfg.frontend_url))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET])
        .allow_credentials(true);

    let listener = tokio::net::TcpListener::bind(cfg.addr).await?;
    tracing::info!(addr = %cfg.addr, auth = cfg.require_auth, "lobby listening");

    let app = routes::router()
        .layer(Extension(hub))
        .layer(Extension(Arc::new(cfg)))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
