use crate::model::{AttendanceEvent, AttendanceStatus, GeoPoint, RecordedVia};
use crate::net::{ApiError, ServerConfig};
use crate::outbox::{self, OutboxEntry};
use chrono::{DateTime, Utc};
use log::{info, warn};
use rusqlite::Connection;
use uuid::Uuid;

/// Everything the submitter needs to turn a validated intent (or a manual
/// mark) into one attendance event.
#[derive(Debug, Clone)]
pub struct Submission {
    pub class_id: String,
    pub student_id: String,
    pub student_name: Option<String>,
    pub status: AttendanceStatus,
    pub recorded_via: RecordedVia,
    pub device_info: Option<String>,
    pub location: Option<GeoPoint>,
}

#[derive(Debug)]
pub enum SubmitOutcome {
    /// The server stored the event and echoed it back.
    Confirmed {
        event: AttendanceEvent,
        base_url: String,
    },
    /// Degraded success: the record sits in the local journal pending sync.
    /// Callers must not present this as a confirmed remote write.
    Queued(OutboxEntry),
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("local journal write failed: {0}")]
    Store(anyhow::Error),
}

impl From<anyhow::Error> for SubmitError {
    fn from(e: anyhow::Error) -> Self {
        SubmitError::Store(e)
    }
}

pub fn default_device_info() -> String {
    format!(
        "rollcalld/{} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

pub fn build_event(sub: &Submission, now: DateTime<Utc>) -> AttendanceEvent {
    AttendanceEvent {
        class_id: sub.class_id.clone(),
        student_id: sub.student_id.clone(),
        student_name: sub.student_name.clone(),
        timestamp: now,
        status: sub.status,
        recorded_via: sub.recorded_via,
        idempotency_key: Uuid::new_v4().to_string(),
        device_info: Some(
            sub.device_info
                .clone()
                .unwrap_or_else(default_device_info),
        ),
        location: sub.location,
    }
}

/// Submit one event. No reachable endpoint sends the event to the journal
/// (degraded success); once a server answered the probe, submission
/// failures surface as errors instead, so a successful call produces
/// exactly one of {remote confirmation, journal entry} and a failed call
/// produces neither.
pub fn submit(
    conn: &Connection,
    cfg: &ServerConfig,
    sub: Submission,
    now: DateTime<Utc>,
) -> Result<SubmitOutcome, SubmitError> {
    let event = build_event(&sub, now);

    let base = match cfg.resolve() {
        Ok(base) => base,
        Err(ApiError::NoReachableEndpoint) => return queue(conn, event, now),
        Err(e) => return Err(e.into()),
    };
    let api = cfg.client(&base)?;

    match api.submit_event(&event, false) {
        Ok(stored) => {
            info!(
                "attendance event confirmed for {}/{}",
                event.class_id, event.student_id
            );
            Ok(SubmitOutcome::Confirmed {
                event: stored,
                base_url: base,
            })
        }
        Err(first) if first.is_auth() => {
            // Known race: the client can be built before the session token
            // lands, so the implicit header is missing. One retry with the
            // credential attached explicitly.
            match api.submit_event(&event, true) {
                Ok(stored) => Ok(SubmitOutcome::Confirmed {
                    event: stored,
                    base_url: base,
                }),
                Err(retry) => Err(retry.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}

fn queue(
    conn: &Connection,
    event: AttendanceEvent,
    now: DateTime<Utc>,
) -> Result<SubmitOutcome, SubmitError> {
    let entry = OutboxEntry {
        local_id: Uuid::new_v4().to_string(),
        queued_at: now,
        event,
    };
    outbox::append(conn, &entry)?;
    warn!(
        "no reachable server; queued attendance record {} locally",
        entry.local_id
    );
    Ok(SubmitOutcome::Queued(entry))
}
