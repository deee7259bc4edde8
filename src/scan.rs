use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shared constant expected in every scanned attendance payload.
///
/// This is a plain equality check against a value embedded in every client,
/// not a signature: anyone who can read the payload format can forge a valid
/// scan. Replacing it with short-lived signed tokens is a server-side change.
pub const ATTENDANCE_SECURE_KEY: &str = "ROLLCALL_ATTENDANCE_V1";

const ATTENDANCE_PAYLOAD_TYPE: &str = "attendance";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPayload {
    #[serde(rename = "type")]
    kind: Option<String>,
    secure_key: Option<String>,
    version: Option<String>,
    class_id: Option<String>,
    subject_code: Option<String>,
    class_name: Option<String>,
    year_section: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

/// Validated attendance intent: what a good scan means, before any event
/// exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanIntent {
    pub class_id: String,
    pub subject_code: String,
    pub class_name: String,
    pub year_section: String,
    pub scanned_at: DateTime<Utc>,
}

/// Decode outcomes. Non-JSON input is not a hard failure: the raw text may
/// be a manually issued class code, so it is handed back as an opaque token
/// for the manual-entry path.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Intent(ScanIntent),
    OpaqueToken(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanReject {
    #[error("payload is not an attendance code")]
    WrongPayloadType,
    #[error("payload failed security validation")]
    SecurityValidationFailed,
    #[error("payload is missing {0}")]
    MissingField(&'static str),
}

/// Pure validation of raw scanned text. No side effects, no clock reads
/// beyond defaulting `scannedAt` from the caller-supplied `now`.
pub fn validate_payload(raw: &str, now: DateTime<Utc>) -> Result<ScanOutcome, ScanReject> {
    let parsed: RawPayload = match serde_json::from_str(raw) {
        Ok(v) => v,
        // MalformedPayload: not JSON-shaped, fall through to the opaque
        // token path rather than aborting the scan.
        Err(_) => return Ok(ScanOutcome::OpaqueToken(raw.trim().to_string())),
    };

    match parsed.kind.as_deref() {
        Some(ATTENDANCE_PAYLOAD_TYPE) => {}
        _ => return Err(ScanReject::WrongPayloadType),
    }

    // Authenticity markers: secureKey must match the shared constant and a
    // version must be present. Checked before any payload field is trusted.
    match parsed.secure_key.as_deref() {
        Some(key) if key == ATTENDANCE_SECURE_KEY => {}
        _ => return Err(ScanReject::SecurityValidationFailed),
    }
    if parsed.version.as_deref().map(str::trim).unwrap_or("") == "" {
        return Err(ScanReject::SecurityValidationFailed);
    }

    let class_id = parsed
        .class_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ScanReject::MissingField("classId"))?
        .to_string();

    Ok(ScanOutcome::Intent(ScanIntent {
        class_id,
        subject_code: parsed.subject_code.unwrap_or_default(),
        class_name: parsed.class_name.unwrap_or_default(),
        year_section: parsed.year_section.unwrap_or_default(),
        scanned_at: parsed.timestamp.unwrap_or(now),
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    Decoded,
    Stopped,
}

impl ScanState {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::Scanning => "scanning",
            ScanState::Decoded => "decoded",
            ScanState::Stopped => "stopped",
        }
    }
}

/// One camera session. The original client polled frames on an interval and
/// had to clear the timer on decode/stop to avoid duplicate submissions;
/// here the same guarantee is a state machine: a session yields at most one
/// decode outcome, and frames outside Scanning are rejected.
#[derive(Debug)]
pub struct ScanSession {
    state: ScanState,
}

impl Default for ScanSession {
    fn default() -> Self {
        Self {
            state: ScanState::Idle,
        }
    }
}

impl ScanSession {
    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn start(&mut self) -> ScanState {
        self.state = ScanState::Scanning;
        self.state
    }

    pub fn stop(&mut self) -> ScanState {
        self.state = ScanState::Stopped;
        self.state
    }

    /// Feed one decoded frame of text. A successful decode transitions to
    /// Decoded synchronously, so no later frame can produce a second
    /// outcome. Rejections keep the session in Scanning so the user can
    /// line up another code.
    pub fn frame(&mut self, text: &str, now: DateTime<Utc>) -> FrameResult {
        if self.state != ScanState::Scanning {
            return FrameResult::NotActive(self.state);
        }
        match validate_payload(text, now) {
            Ok(outcome) => {
                self.state = ScanState::Decoded;
                FrameResult::Decoded(outcome)
            }
            Err(reject) => FrameResult::Rejected(reject),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameResult {
    /// The session is not scanning; the frame was discarded.
    NotActive(ScanState),
    Decoded(ScanOutcome),
    Rejected(ScanReject),
}
