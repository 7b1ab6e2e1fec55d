//! JSON-RPC ledger client — implements [`LedgerStore`] over the remote
//! ledger endpoint.
//!
//! ## Resilience
//!
//! * Exponential back-off is applied on transport errors, rate-limit and
//!   5xx responses, and soft RPC errors, up to [`MAX_BACKOFF_SECS`] seconds and
//!   at most [`MAX_ATTEMPTS`] tries; exhausted retries surface as
//!   [`StoreError::Unavailable`], which callers may retry with their own
//!   backoff.  Timeouts are never swallowed.
//! * Hard JSON-RPC errors (malformed request / unknown method) fail
//!   immediately as [`StoreError::Protocol`].
//!
//! Zero-address sentinels in read responses are decoded to `None` here, at
//! the boundary, so the registries only ever see `Option`s.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use cfp_registry::{
    AccountState, Address, CallId, CallRecord, Commitment, LedgerClock, LedgerStore, ProposalId,
    ProposalRecord, RejectReason, StoreError, WriteBatch,
};

use crate::config::Config;

const MAX_BACKOFF_SECS: u64 = 60;
const INITIAL_BACKOFF_SECS: u64 = 2;
const MAX_ATTEMPTS: u32 = 5;

// ─────────────────────────────────────────────────────────
// JSON-RPC response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    /// Invalid request, unknown method, invalid params, parse error —
    /// retrying cannot help.
    fn is_hard(&self) -> bool {
        matches!(self.code, -32700 | -32600 | -32601 | -32602)
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResult {
    hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
enum Receipt {
    Committed,
    Rejected { reason: RejectReason },
}

// ─────────────────────────────────────────────────────────
// Decoding
// ─────────────────────────────────────────────────────────

fn protocol_err(context: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Protocol(format!("{context}: {err}"))
}

fn decode<T: serde::de::DeserializeOwned>(context: &str, value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| protocol_err(context, e))
}

/// A call read is `None` when the RPC returns `null` or the zero-creator
/// sentinel record.
fn decode_call(value: Value) -> Result<Option<CallRecord>, StoreError> {
    if value.is_null() {
        return Ok(None);
    }
    let record: CallRecord = decode("call record", value)?;
    Ok((!record.creator.is_zero()).then_some(record))
}

/// A proposal read is `None` on `null` or the zero-sender sentinel.
fn decode_proposal(value: Value) -> Result<Option<ProposalRecord>, StoreError> {
    if value.is_null() {
        return Ok(None);
    }
    let record: ProposalRecord = decode("proposal record", value)?;
    Ok((!record.sender.is_zero()).then_some(record))
}

// ─────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────

/// [`LedgerStore`] backed by the remote ledger's JSON-RPC endpoint.
pub struct RpcLedger {
    client: Client,
    url: String,
    poll_interval: Duration,
    commit_timeout: Duration,
}

impl RpcLedger {
    pub fn new(client: Client, config: &Config) -> Self {
        RpcLedger {
            client,
            url: config.rpc_url.clone(),
            poll_interval: Duration::from_millis(config.commit_poll_interval_ms),
            commit_timeout: Duration::from_secs(config.commit_timeout_secs),
        }
    }

    /// Issue one JSON-RPC request with bounded retry.  Returns the `result`
    /// payload (`Value::Null` when the method returned null).
    async fn request(&self, method: &str, params: Value) -> Result<Value, StoreError> {
        let mut backoff = INITIAL_BACKOFF_SECS;

        for attempt in 1..=MAX_ATTEMPTS {
            let response = self
                .client
                .post(&self.url)
                .json(&json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "method": method,
                    "params": params,
                }))
                .send()
                .await;

            let retry_reason = match response {
                Err(e) => e.to_string(),
                Ok(resp) if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    "rate-limited by RPC".to_string()
                }
                // A 5xx from the node or a proxy in front of it is a
                // transient upstream failure, not a protocol violation.
                Ok(resp) if resp.status().is_server_error() => {
                    format!("upstream HTTP {}", resp.status())
                }
                Ok(resp) => {
                    let body: RpcResponse =
                        resp.json().await.map_err(|e| protocol_err(method, e))?;
                    match body.error {
                        Some(err) if err.is_hard() => {
                            return Err(StoreError::Protocol(format!(
                                "{method}: RPC error {}: {}",
                                err.code, err.message
                            )));
                        }
                        Some(err) => format!("RPC error {}: {}", err.code, err.message),
                        None => {
                            debug!("{method} ok (attempt {attempt})");
                            return Ok(body.result.unwrap_or(Value::Null));
                        }
                    }
                }
            };

            if attempt < MAX_ATTEMPTS {
                warn!("{method} failed (will retry in {backoff}s): {retry_reason}");
                tokio::time::sleep(Duration::from_secs(backoff)).await;
                backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
            } else {
                return Err(StoreError::Unavailable(format!(
                    "{method}: {retry_reason}"
                )));
            }
        }

        unreachable!("retry loop returns on the last attempt")
    }
}

#[async_trait]
impl LedgerStore for RpcLedger {
    async fn owner(&self) -> Result<Address, StoreError> {
        let value = self.request("cfp_owner", json!([])).await?;
        decode("owner address", value)
    }

    async fn account_state(&self, account: &Address) -> Result<AccountState, StoreError> {
        let value = self.request("cfp_accountState", json!([account])).await?;
        decode("account state", value)
    }

    async fn pending(&self) -> Result<Vec<Address>, StoreError> {
        let value = self.request("cfp_pending", json!([])).await?;
        decode("pending list", value)
    }

    async fn call(&self, call_id: &CallId) -> Result<Option<CallRecord>, StoreError> {
        let value = self.request("cfp_call", json!([call_id])).await?;
        decode_call(value)
    }

    async fn all_call_ids(&self) -> Result<Vec<CallId>, StoreError> {
        let value = self.request("cfp_allCallIds", json!([])).await?;
        decode("call id list", value)
    }

    async fn created_by(&self, creator: &Address) -> Result<Vec<CallId>, StoreError> {
        let value = self.request("cfp_createdBy", json!([creator])).await?;
        decode("created-by list", value)
    }

    async fn creators(&self) -> Result<Vec<Address>, StoreError> {
        let value = self.request("cfp_creators", json!([])).await?;
        decode("creator list", value)
    }

    async fn proposal(
        &self,
        call_id: &CallId,
        proposal_id: &ProposalId,
    ) -> Result<Option<ProposalRecord>, StoreError> {
        let value = self
            .request("cfp_proposal", json!([call_id, proposal_id]))
            .await?;
        decode_proposal(value)
    }

    async fn proposals(&self, call_id: &CallId) -> Result<Vec<ProposalId>, StoreError> {
        let value = self.request("cfp_proposals", json!([call_id])).await?;
        decode("proposal id list", value)
    }

    async fn clock(&self) -> Result<LedgerClock, StoreError> {
        let value = self.request("cfp_clock", json!([])).await?;
        decode("ledger clock", value)
    }

    async fn submit(&self, batch: WriteBatch) -> Result<Commitment, StoreError> {
        let value = self.request("cfp_submit", json!([batch])).await?;
        let result: SubmitResult = decode("submit result", value)?;
        Ok(Commitment {
            handle: result.hash,
        })
    }

    /// Poll the receipt until the batch reaches a terminal state.  Reported
    /// success therefore always means durable commitment.
    async fn wait(&self, commitment: &Commitment) -> Result<(), StoreError> {
        let deadline = tokio::time::Instant::now() + self.commit_timeout;

        loop {
            let value = self
                .request("cfp_receipt", json!([commitment.handle]))
                .await?;
            if !value.is_null() {
                return match decode::<Receipt>("receipt", value)? {
                    Receipt::Committed => Ok(()),
                    Receipt::Rejected { reason } => Err(StoreError::Rejected(reason)),
                };
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(StoreError::Unavailable(format!(
                    "timed out waiting for commitment of {}",
                    commitment.handle
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use cfp_registry::WriteOp;

    fn hex20(n: u8) -> String {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        format!("0x{}", hex::encode(bytes))
    }

    fn hex32(n: u8) -> String {
        let mut bytes = [0u8; 32];
        bytes[31] = n;
        format!("0x{}", hex::encode(bytes))
    }

    #[test]
    fn null_call_decodes_to_none() {
        assert_eq!(decode_call(Value::Null).unwrap(), None);
    }

    #[test]
    fn zero_creator_sentinel_decodes_to_none() {
        let value = json!({
            "creator": hex20(0),
            "cfp": hex20(0),
            "closingTime": 0,
        });
        assert_eq!(decode_call(value).unwrap(), None);
    }

    #[test]
    fn present_call_decodes_to_record() {
        let value = json!({
            "creator": hex20(2),
            "cfp": hex20(9),
            "closingTime": 1_700_000_100u64,
        });
        let record = decode_call(value).unwrap().unwrap();
        assert_eq!(record.creator.to_string(), hex20(2));
        assert_eq!(record.cfp.to_string(), hex20(9));
        assert_eq!(record.closing_time, 1_700_000_100);
    }

    #[test]
    fn zero_sender_proposal_decodes_to_none() {
        let value = json!({
            "sender": hex20(0),
            "blockNumber": 0,
            "timestamp": 0,
        });
        assert_eq!(decode_proposal(value).unwrap(), None);
    }

    #[test]
    fn present_proposal_decodes_to_record() {
        let value = json!({
            "sender": hex20(3),
            "blockNumber": 42u64,
            "timestamp": 1_700_000_050u64,
        });
        let record = decode_proposal(value).unwrap().unwrap();
        assert_eq!(record.sender.to_string(), hex20(3));
        assert_eq!(record.block_number, 42);
        assert_eq!(record.timestamp, 1_700_000_050);
    }

    #[test]
    fn malformed_record_is_a_protocol_error() {
        let err = decode_call(json!({"creator": "garbage"})).unwrap_err();
        assert!(matches!(err, StoreError::Protocol(_)));
    }

    #[test]
    fn receipt_parses_terminal_states() {
        let committed: Receipt = serde_json::from_value(json!({"status": "committed"})).unwrap();
        assert!(matches!(committed, Receipt::Committed));

        let rejected: Receipt = serde_json::from_value(json!({
            "status": "rejected",
            "reason": "call_closed",
        }))
        .unwrap();
        match rejected {
            Receipt::Rejected { reason } => assert_eq!(reason, RejectReason::CallClosed),
            other => panic!("unexpected receipt: {other:?}"),
        }
    }

    #[test]
    fn batch_serializes_to_tagged_wire_shape() {
        let batch = WriteBatch::single(WriteOp::RegisterProposal {
            call_id: hex32(1).parse().unwrap(),
            proposal_id: hex32(2).parse().unwrap(),
            sender: hex20(3).parse().unwrap(),
        });
        let value = serde_json::to_value(&batch).unwrap();
        assert_eq!(value["ops"][0]["op"], "registerProposal");
        assert_eq!(value["ops"][0]["callId"], hex32(1));
        assert_eq!(value["ops"][0]["proposalId"], hex32(2));
        assert_eq!(value["ops"][0]["sender"], hex20(3));
    }

    /// Serves the same canned HTTP response to every connection.
    async fn canned_server(status_line: &str, body: &str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: text/html\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{addr}")
    }

    fn test_config(rpc_url: String) -> Config {
        Config {
            rpc_url,
            signer_address: hex20(1).parse().unwrap(),
            api_port: 0,
            rpc_timeout_secs: 5,
            commit_poll_interval_ms: 10,
            commit_timeout_secs: 1,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn upstream_server_error_surfaces_as_unavailable() {
        let url = canned_server("502 Bad Gateway", "<html>Bad Gateway</html>").await;
        let ledger = RpcLedger::new(Client::new(), &test_config(url));

        let err = ledger.owner().await.unwrap_err();
        match err {
            StoreError::Unavailable(detail) => assert!(detail.contains("502")),
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[test]
    fn hard_rpc_errors_are_recognised() {
        for code in [-32700, -32600, -32601, -32602] {
            assert!(RpcError {
                code,
                message: String::new()
            }
            .is_hard());
        }
        assert!(!RpcError {
            code: -32000,
            message: String::new()
        }
        .is_hard());
    }
}
