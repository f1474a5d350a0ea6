//! # Remote Store
//!
//! The upload seam. The engine only knows [`RemoteStore`]; the HTTP client
//! below speaks the remote's mutation endpoint.
//!
//! ## Wire Format
//! ```text
//! POST {remote_url}/api/mutation
//! Authorization: Bearer <token>
//!
//! { "path": "products:upsert",
//!   "args": { "businessId": "...", "record": { "id": "...", ... } },
//!   "format": "json" }
//!
//! 200 { "status": "success", "value": "<remote id>" | { "_id": ... } | null }
//! 200 { "status": "error",   "errorMessage": "..." }
//! ```
//!
//! Upserts are keyed by the local `id`, so sending the same record twice
//! leaves the remote with one row.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tally_core::SyncTable;
use tracing::{debug, warn};
use url::Url;

use crate::config::SyncSettings;
use crate::error::{SyncError, SyncResult};

/// One record to create or replace remotely.
#[derive(Debug, Clone, Serialize)]
pub struct UpsertRequest {
    pub table: SyncTable,
    pub business_id: String,
    pub record_id: String,
    pub payload: Value,
}

/// What the remote said about an accepted record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteAck {
    /// Remote-side id, when the store reports one.
    pub remote_id: Option<String>,
}

/// Sent once after every cycle that was not aborted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncBeacon {
    pub business_id: String,
    pub device_id: String,
    pub device_name: String,
    pub completed_at: i64,
    pub uploaded: usize,
    pub failed: usize,
}

/// Somewhere PENDING rows can be upserted.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Creates or replaces one record, keyed by its local id.
    ///
    /// `RemoteRejected` means this record failed and the cycle may go on;
    /// errors for which [`SyncError::aborts_cycle`] holds stop the cycle.
    async fn upsert(&self, request: &UpsertRequest) -> SyncResult<RemoteAck>;

    /// Records a completed cycle for this device.
    async fn beacon(&self, beacon: &SyncBeacon) -> SyncResult<()>;
}

// =============================================================================
// HTTP Remote Store
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MutationResponse {
    status: String,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    error_message: Option<String>,
}

/// [`RemoteStore`] over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: Client,
    endpoint: Url,
    auth_token: Option<String>,
    timeout_secs: u64,
}

impl HttpRemoteStore {
    pub fn new(settings: &SyncSettings) -> SyncResult<Self> {
        let base = settings
            .remote_url
            .as_deref()
            .ok_or_else(|| SyncError::InvalidConfig("remote_url is not set".into()))?;

        let mut base = Url::parse(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join("api/mutation")?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| SyncError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(HttpRemoteStore {
            client,
            endpoint,
            auth_token: settings.auth_token.clone(),
            timeout_secs: settings.request_timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn mutation(&self, path: &str, args: Value) -> SyncResult<Option<Value>> {
        let body = json!({ "path": path, "args": args, "format": "json" });

        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(ref token) = self.auth_token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await.map_err(|e| self.transport_error(&e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(path, status));
        }

        let parsed: MutationResponse = resp
            .json()
            .await
            .map_err(|e| SyncError::UnexpectedResponse(e.to_string()))?;

        match parsed.status.as_str() {
            "success" => Ok(parsed.value),
            "error" => Err(SyncError::UnexpectedResponse(
                parsed
                    .error_message
                    .unwrap_or_else(|| "mutation failed".to_string()),
            )),
            other => Err(SyncError::UnexpectedResponse(format!(
                "unknown status '{other}'"
            ))),
        }
    }

    fn transport_error(&self, err: &reqwest::Error) -> SyncError {
        if err.is_timeout() {
            return SyncError::Timeout(self.timeout_secs);
        }
        if err.is_connect() {
            return SyncError::ConnectionFailed(format!("Cannot reach {}", self.endpoint));
        }
        if err.is_builder() {
            return SyncError::InvalidUrl(self.endpoint.to_string());
        }
        SyncError::ConnectionFailed(format!(
            "Network error communicating with {}: {err}",
            self.endpoint
        ))
    }
}

/// Maps a non-2xx answer. Credentials problems stop the cycle; anything
/// else is charged to the record being sent.
fn status_error(path: &str, status: StatusCode) -> SyncError {
    match status.as_u16() {
        s @ (401 | 403) => SyncError::Unauthorized(s),
        s if s >= 500 => SyncError::UnexpectedResponse(format!("{path}: server error (HTTP {s})")),
        s => SyncError::UnexpectedResponse(format!("{path}: HTTP {s}")),
    }
}

/// Pulls a remote id out of a mutation result.
fn remote_id_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(id) => Some(id.clone()),
        Value::Object(obj) => obj
            .get("_id")
            .or_else(|| obj.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn upsert(&self, request: &UpsertRequest) -> SyncResult<RemoteAck> {
        let path = format!("{}:upsert", request.table.table_name());
        let args = json!({
            "businessId": request.business_id,
            "record": request.payload,
        });

        match self.mutation(&path, args).await {
            Ok(value) => {
                debug!(table = %request.table, id = %request.record_id, "Remote upsert accepted");
                Ok(RemoteAck {
                    remote_id: remote_id_of(value.as_ref()),
                })
            }
            Err(SyncError::UnexpectedResponse(message)) => {
                warn!(table = %request.table, id = %request.record_id, %message, "Remote upsert rejected");
                Err(SyncError::RemoteRejected {
                    table: request.table.to_string(),
                    id: request.record_id.clone(),
                    message,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn beacon(&self, beacon: &SyncBeacon) -> SyncResult<()> {
        self.mutation("syncHealth:beacon", serde_json::to_value(beacon)?)
            .await
            .map(|_| ())
    }
}
