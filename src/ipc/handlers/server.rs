use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{api_error_response, db_conn, server_config, CANDIDATES_KEY};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_server_configure(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let Some(raw) = req.params.get("candidates").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing candidates", None);
    };
    let candidates: Vec<String> = raw
        .iter()
        .filter_map(|v| v.as_str())
        .map(|s| s.trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if candidates.is_empty() {
        return err(&req.id, "bad_params", "candidates must be a non-empty list of URLs", None);
    }
    if let Err(e) = db::settings_set_json(conn, CANDIDATES_KEY, &json!(candidates)) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "candidates": candidates }))
}

fn handle_server_resolve(state: &mut AppState, req: &Request) -> serde_json::Value {
    let cfg = server_config(state, req);
    match cfg.resolve() {
        Ok(base) => {
            state.active_base = Some(base.clone());
            ok(&req.id, json!({ "baseUrl": base }))
        }
        Err(e) => api_error_response(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "server.configure" => Some(handle_server_configure(state, req)),
        "server.resolve" => Some(handle_server_resolve(state, req)),
        _ => None,
    }
}
