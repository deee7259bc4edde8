use crate::db;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::net::{
    ApiError, ServerConfig, DEFAULT_CANDIDATES, DEFAULT_PROBE_TIMEOUT_MS,
    DEFAULT_REQUEST_TIMEOUT_MS,
};
use rusqlite::Connection;
use std::time::Duration;

pub const CANDIDATES_KEY: &str = "server.candidates";

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
}

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// Candidate bases in priority order: explicit env override, then the
/// workspace's configured list, then the built-in defaults.
pub fn server_candidates(conn: Option<&Connection>) -> Vec<String> {
    let mut out = Vec::new();
    if let Ok(url) = std::env::var("ROLLCALL_API_URL") {
        let url = url.trim().to_string();
        if !url.is_empty() {
            out.push(url);
        }
    }
    if let Some(conn) = conn {
        if let Ok(Some(value)) = db::settings_get_json(conn, CANDIDATES_KEY) {
            if let Some(arr) = value.as_array() {
                out.extend(arr.iter().filter_map(|v| v.as_str().map(String::from)));
            }
        }
    }
    if out.is_empty() {
        out.extend(DEFAULT_CANDIDATES.iter().map(|s| s.to_string()));
    }
    out
}

fn timeout_ms(req: &Request, key: &str, default_ms: u64) -> Duration {
    Duration::from_millis(
        req.params
            .get(key)
            .and_then(|v| v.as_u64())
            .unwrap_or(default_ms),
    )
}

/// Snapshot of everything a remote call needs, taken from session state at
/// call time. Timeout overrides come in through params so the UI (and the
/// tests) can budget probes tighter than the defaults.
pub fn server_config(state: &AppState, req: &Request) -> ServerConfig {
    ServerConfig {
        candidates: server_candidates(state.db.as_ref()),
        token: state.user.as_ref().and_then(|u| u.token.clone()),
        probe_timeout: timeout_ms(req, "probeTimeoutMs", DEFAULT_PROBE_TIMEOUT_MS),
        request_timeout: timeout_ms(req, "requestTimeoutMs", DEFAULT_REQUEST_TIMEOUT_MS),
    }
}

/// Translate a remote failure into the stable IPC error vocabulary. The
/// caller handles `AuthenticationFailed` side effects (token invalidation)
/// before calling this.
pub fn api_error_response(id: &str, e: &ApiError) -> serde_json::Value {
    match e {
        ApiError::NoReachableEndpoint => err(id, "no_server", "no reachable server endpoint", None),
        ApiError::AuthenticationFailed => err(id, "auth_failed", "log in again", None),
        ApiError::NotEnrolled => err(id, "not_enrolled", "not enrolled in this class", None),
        ApiError::Timeout | ApiError::Network(_) => {
            err(id, "network_error", "connection problem, try again", None)
        }
        ApiError::Server { status, message } => err(
            id,
            "server_error",
            message.clone(),
            Some(serde_json::json!({ "status": status })),
        ),
    }
}
