use crate::ipc::error::{err, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use crate::scan::{FrameResult, ScanOutcome, ScanReject};
use chrono::Utc;
use serde_json::json;

fn handle_scan_start(state: &mut AppState, req: &Request) -> serde_json::Value {
    let s = state.scan.start();
    ok(&req.id, json!({ "state": s.as_str() }))
}

fn handle_scan_stop(state: &mut AppState, req: &Request) -> serde_json::Value {
    let s = state.scan.stop();
    ok(&req.id, json!({ "state": s.as_str() }))
}

fn handle_scan_frame(state: &mut AppState, req: &Request) -> serde_json::Value {
    let text = match required_str(req, "text") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match state.scan.frame(&text, Utc::now()) {
        FrameResult::NotActive(s) => err(
            &req.id,
            "scan_not_active",
            "scanner is not running",
            Some(json!({ "state": s.as_str() })),
        ),
        FrameResult::Decoded(ScanOutcome::Intent(intent)) => ok(
            &req.id,
            json!({
                "decoded": true,
                "intent": intent,
            }),
        ),
        // Not attendance JSON at all: hand the raw text to the manual-entry
        // path instead of failing the scan.
        FrameResult::Decoded(ScanOutcome::OpaqueToken(token)) => ok(
            &req.id,
            json!({
                "decoded": true,
                "manualEntry": true,
                "token": token,
            }),
        ),
        FrameResult::Rejected(reject) => {
            let code = match reject {
                ScanReject::WrongPayloadType => "wrong_payload_type",
                ScanReject::SecurityValidationFailed => "security_validation_failed",
                ScanReject::MissingField(_) => "malformed_payload",
            };
            err(&req.id, code, reject.to_string(), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scan.start" => Some(handle_scan_start(state, req)),
        "scan.frame" => Some(handle_scan_frame(state, req)),
        "scan.stop" => Some(handle_scan_stop(state, req)),
        _ => None,
    }
}
