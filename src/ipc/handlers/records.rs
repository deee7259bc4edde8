use crate::ipc::error::{err, ok};
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use crate::outbox;
use serde_json::json;

fn handle_records_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match outbox::list(conn) {
        Ok(entries) => match serde_json::to_value(&entries) {
            Ok(records) => ok(&req.id, json!({ "records": records })),
            Err(e) => err(&req.id, "journal_read_failed", e.to_string(), None),
        },
        Err(e) => err(&req.id, "journal_read_failed", e.to_string(), None),
    }
}

fn handle_records_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match outbox::clear(conn) {
        Ok(n) => ok(&req.id, json!({ "cleared": n })),
        Err(e) => err(&req.id, "journal_write_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "records.list" => Some(handle_records_list(state, req)),
        "records.clear" => Some(handle_records_clear(state, req)),
        _ => None,
    }
}
