//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::DateTime;
use serde::{Deserialize, Serialize};

use cfp_registry::Facade;

use crate::errors::ApiError;
use crate::rpc::RpcLedger;

pub struct ApiState {
    pub facade: Facade<RpcLedger>,
}

/// UNIX seconds → ISO-8601, or `None` when the value is unrepresentable.
fn to_iso(timestamp: u64) -> Option<String> {
    let secs = i64::try_from(timestamp).ok()?;
    DateTime::from_timestamp(secs, 0).map(|dt| dt.to_rfc3339())
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSummary {
    pub call_id: String,
    pub creator: String,
    pub cfp_address: String,
    pub closing_time: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallsResponse {
    pub count: usize,
    pub calls: Vec<CallSummary>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResponse {
    pub creator: String,
    pub cfp: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosingTimeResponse {
    pub closing_time: Option<String>,
}

#[derive(Serialize)]
pub struct CreatorsResponse {
    pub creators: Vec<String>,
}

#[derive(Serialize)]
pub struct PendingResponse {
    pub pending: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalDataResponse {
    pub sender: String,
    pub block_number: u64,
    pub timestamp: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterProposalRequest {
    pub call_id: String,
    pub proposal: String,
}

#[derive(Serialize)]
pub struct RegisterProposalResponse {
    pub message: &'static str,
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /calls`
///
/// Every call on the ledger, with its creator, per-call registry address
/// and ISO-8601 closing time.
pub async fn get_calls(State(state): State<Arc<ApiState>>) -> Result<impl IntoResponse, ApiError> {
    let calls = state.facade.list_calls().await?;
    let calls: Vec<CallSummary> = calls
        .into_iter()
        .map(|c| CallSummary {
            call_id: c.call_id.to_string(),
            creator: c.creator.to_string(),
            cfp_address: c.cfp.to_string(),
            closing_time: to_iso(c.closing_time),
        })
        .collect();
    Ok(Json(CallsResponse {
        count: calls.len(),
        calls,
    }))
}

/// `GET /calls/:call_id`
pub async fn get_call(
    State(state): State<Arc<ApiState>>,
    Path(call_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.facade.call_detail(&call_id).await?;
    Ok(Json(CallResponse {
        creator: detail.creator.to_string(),
        cfp: detail.cfp.to_string(),
    }))
}

/// `GET /closing-time/:call_id`
pub async fn get_closing_time(
    State(state): State<Arc<ApiState>>,
    Path(call_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let closing_time = state.facade.closing_time(&call_id).await?;
    Ok(Json(ClosingTimeResponse {
        closing_time: to_iso(closing_time),
    }))
}

/// `GET /creators`
pub async fn get_creators(
    State(state): State<Arc<ApiState>>,
) -> Result<impl IntoResponse, ApiError> {
    let creators = state.facade.creators().await?;
    Ok(Json(CreatorsResponse {
        creators: creators.iter().map(|a| a.to_string()).collect(),
    }))
}

/// `GET /pendings`
///
/// Accounts waiting for authorization.  Owner-only: fails with 401 when the
/// gateway signer is not the registry owner.
pub async fn get_pendings(
    State(state): State<Arc<ApiState>>,
) -> Result<impl IntoResponse, ApiError> {
    let pending = state.facade.pending_accounts().await?;
    Ok(Json(PendingResponse {
        pending: pending.iter().map(|a| a.to_string()).collect(),
    }))
}

/// `GET /proposal-data/:call_id/:proposal`
pub async fn get_proposal_data(
    State(state): State<Arc<ApiState>>,
    Path((call_id, proposal)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let data = state.facade.proposal_data(&call_id, &proposal).await?;
    Ok(Json(ProposalDataResponse {
        sender: data.sender.to_string(),
        block_number: data.block_number,
        timestamp: to_iso(data.timestamp),
    }))
}

/// `POST /register-proposal`
///
/// Registers the proposal with the gateway signer as the recorded sender.
/// Responds only after the mutation is durably committed.
pub async fn register_proposal(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<RegisterProposalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .facade
        .register_proposal(&body.call_id, &body.proposal)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterProposalResponse { message: "OK" }),
    ))
}
