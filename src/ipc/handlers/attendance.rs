use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{api_error_response, db_conn, optional_str, required_str, server_config};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceStatus, GeoPoint, RecordedVia};
use crate::submit::{self, Submission, SubmitError, SubmitOutcome};
use chrono::Utc;
use serde_json::json;

fn parse_location(req: &Request) -> Result<Option<GeoPoint>, serde_json::Value> {
    let Some(raw) = req.params.get("location") else {
        return Ok(None);
    };
    if raw.is_null() {
        return Ok(None);
    }
    serde_json::from_value::<GeoPoint>(raw.clone())
        .map(Some)
        .map_err(|_| {
            err(
                &req.id,
                "bad_params",
                "location must be {latitude, longitude}",
                None,
            )
        })
}

fn run_submission(
    state: &mut AppState,
    req: &Request,
    sub: Submission,
) -> serde_json::Value {
    let cfg = server_config(state, req);
    let outcome = {
        let conn = match db_conn(state, req) {
            Ok(c) => c,
            Err(resp) => return resp,
        };
        submit::submit(conn, &cfg, sub, Utc::now())
    };

    match outcome {
        Ok(SubmitOutcome::Confirmed { event, base_url }) => {
            state.active_base = Some(base_url);
            ok(&req.id, json!({ "confirmed": true, "event": event }))
        }
        Ok(SubmitOutcome::Queued(entry)) => ok(
            &req.id,
            json!({
                "queued": true,
                "pendingSync": true,
                "record": entry,
            }),
        ),
        Err(SubmitError::Api(e)) => {
            if e.is_auth() {
                // Cached credential is stale; drop it so the UI re-prompts.
                if let Some(user) = state.user.as_mut() {
                    user.token = None;
                }
            }
            api_error_response(&req.id, &e)
        }
        Err(SubmitError::Store(e)) => err(&req.id, "journal_write_failed", e.to_string(), None),
    }
}

/// Scan path: the validated intent's class plus the signed-in student.
fn handle_attendance_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let location = match parse_location(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(user) = state.user.clone() else {
        return err(&req.id, "no_user", "set the signed-in student first", None);
    };

    run_submission(
        state,
        req,
        Submission {
            class_id,
            student_id: user.student_id,
            student_name: user.student_name,
            status: AttendanceStatus::Present,
            recorded_via: RecordedVia::Qr,
            device_info: optional_str(req, "deviceInfo"),
            location,
        },
    )
}

/// Manual path: a teacher records an explicit status for any student.
fn handle_attendance_mark(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let status_raw = match required_str(req, "status") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(status) = AttendanceStatus::parse(&status_raw) else {
        return err(
            &req.id,
            "bad_params",
            "status must be present, absent, or late",
            None,
        );
    };
    let location = match parse_location(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    run_submission(
        state,
        req,
        Submission {
            class_id,
            student_id,
            student_name: optional_str(req, "studentName"),
            status,
            recorded_via: RecordedVia::Manual,
            device_info: optional_str(req, "deviceInfo"),
            location,
        },
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.submit" => Some(handle_attendance_submit(state, req)),
        "attendance.mark" => Some(handle_attendance_mark(state, req)),
        _ => None,
    }
}
