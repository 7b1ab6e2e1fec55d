//! CFP Gateway — entry point.
//!
//! Exposes a small Axum REST API over the Call-for-Proposals ledger: read
//! endpoints for calls, creators, pending accounts, proposal data and
//! closing times, and a write endpoint that registers proposals on behalf
//! of callers using the gateway's own signer identity.  All invariants are
//! enforced by the registry core against fresh ledger reads; the ledger
//! itself remains the sole authoritative store.

mod api;
mod config;
mod errors;
mod rpc;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use reqwest::Client;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cfp_registry::Facade;

use api::ApiState;
use config::Config;
use rpc::RpcLedger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    // Load config from environment.
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // HTTP client for all ledger RPC traffic.
    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(config.rpc_timeout_secs))
        .build()?;

    let ledger = Arc::new(RpcLedger::new(client, &config));
    let facade = Facade::new(ledger, config.signer_address);

    // ─── Event log ────────────────────────────────────────
    let mut events = facade.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(
                proposal = %event.proposal,
                sender = %event.sender,
                block = event.block_number,
                "ProposalRegistered"
            );
        }
    });

    // ─── REST API ─────────────────────────────────────────
    let api_state = Arc::new(ApiState { facade });

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!(
        "API listening on http://{addr} (signer {})",
        api_state.facade.signer()
    );

    let app = Router::new()
        .route("/health", get(api::health))
        .route("/calls", get(api::get_calls))
        .route("/calls/:call_id", get(api::get_call))
        .route("/closing-time/:call_id", get(api::get_closing_time))
        .route("/creators", get(api::get_creators))
        .route("/pendings", get(api::get_pendings))
        .route(
            "/proposal-data/:call_id/:proposal",
            get(api::get_proposal_data),
        )
        .route("/register-proposal", post(api::register_proposal))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(api_state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
