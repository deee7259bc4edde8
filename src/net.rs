use crate::model::{AttendanceEvent, AttendanceReport, ClassInfo, RosterStudent};
use chrono::NaiveDate;
use log::{debug, info};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use std::time::Duration;

pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2_500;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 8_000;

/// Base addresses tried in priority order when a workspace has not
/// configured its own list: cloud endpoint first, then the Android-emulator
/// host alias, then plain loopback.
pub const DEFAULT_CANDIDATES: &[&str] = &[
    "https://api.rollcall.app",
    "http://10.0.2.2:4000",
    "http://127.0.0.1:4000",
];

/// Remote-call failures, already translated: callers never see a raw
/// transport error.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("no reachable server endpoint")]
    NoReachableEndpoint,
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("not enrolled in this class")]
    NotEnrolled,
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
}

impl ApiError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::AuthenticationFailed)
    }
}

fn map_transport(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        // reqwest error strings can nest the full URL; keep the summary only.
        ApiError::Network(err.without_url().to_string())
    }
}

/// Translate a non-success status plus the server's message body into the
/// error taxonomy. 404 is only `NotEnrolled` when the server says so;
/// a generic not-found stays a server error.
fn status_error(status: StatusCode, message: String) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::AuthenticationFailed,
        StatusCode::NOT_FOUND if message.to_ascii_lowercase().contains("enrol") => {
            ApiError::NotEnrolled
        }
        _ => ApiError::Server {
            status: status.as_u16(),
            message,
        },
    }
}

fn error_message(resp: Response) -> String {
    let status = resp.status();
    match resp.json::<serde_json::Value>() {
        Ok(body) => body
            .get("message")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| status.to_string()),
        Err(_) => status.to_string(),
    }
}

fn check(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    Err(status_error(status, error_message(resp)))
}

/// Probe candidates strictly in order; the first base whose `/health`
/// answers wins. Individual probe failures are expected and only logged;
/// only total failure is an error.
pub fn resolve_endpoint(
    candidates: &[String],
    probe_timeout: Duration,
) -> Result<String, ApiError> {
    let client = Client::builder()
        .timeout(probe_timeout)
        .build()
        .map_err(map_transport)?;

    for base in candidates {
        let url = format!("{}/health", base.trim_end_matches('/'));
        match client.get(&url).send() {
            Ok(resp) if resp.status().is_success() || resp.status().is_redirection() => {
                info!("server reachable at {}", base);
                return Ok(base.trim_end_matches('/').to_string());
            }
            Ok(resp) => debug!("probe {} answered {}", url, resp.status()),
            Err(e) => debug!("probe {} failed: {}", url, e),
        }
    }
    Err(ApiError::NoReachableEndpoint)
}

/// Per-call server configuration threaded in from session state: candidate
/// list, session token, and the two independent timeout budgets.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub candidates: Vec<String>,
    pub token: Option<String>,
    pub probe_timeout: Duration,
    pub request_timeout: Duration,
}

impl ServerConfig {
    pub fn resolve(&self) -> Result<String, ApiError> {
        resolve_endpoint(&self.candidates, self.probe_timeout)
    }

    pub fn client(&self, base: &str) -> Result<ApiClient, ApiError> {
        ApiClient::new(base, self.token.as_deref(), self.request_timeout)
    }

    /// Resolve then bind a client to the winning base.
    pub fn connect(&self) -> Result<ApiClient, ApiError> {
        let base = self.resolve()?;
        self.client(&base)
    }
}

/// HTTP client bound to one resolved base address. The base is an explicit
/// value handed in by the caller, so the resolver stays free of hidden
/// module state.
pub struct ApiClient {
    base: String,
    token: Option<String>,
    http: Client,
}

impl ApiClient {
    pub fn new(
        base: &str,
        token: Option<&str>,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let mut headers = reqwest::header::HeaderMap::new();
        // Implicit credential attachment: present only when the session
        // token was known at build time. The submitter's auth retry covers
        // the case where it wasn't.
        if let Some(t) = token {
            if let Ok(v) = format!("Bearer {}", t).parse() {
                headers.insert(reqwest::header::AUTHORIZATION, v);
            }
        }
        let http = Client::builder()
            .timeout(request_timeout)
            .default_headers(headers)
            .build()
            .map_err(map_transport)?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            token: token.map(|t| t.to_string()),
            http,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// POST the event to the attendance endpoint. `explicit_auth` re-attaches
    /// the bearer token on the request itself for the one auth retry.
    pub fn submit_event(
        &self,
        event: &AttendanceEvent,
        explicit_auth: bool,
    ) -> Result<AttendanceEvent, ApiError> {
        let mut req = self.http.post(self.url("/api/attendance")).json(event);
        if explicit_auth {
            if let Some(t) = &self.token {
                req = req.bearer_auth(t);
            }
        }
        let resp = check(req.send().map_err(map_transport)?)?;
        resp.json::<AttendanceEvent>()
            .map_err(|e| ApiError::Network(e.without_url().to_string()))
    }

    pub fn fetch_classes(&self) -> Result<Vec<ClassInfo>, ApiError> {
        let resp = check(
            self.http
                .get(self.url("/api/classes"))
                .send()
                .map_err(map_transport)?,
        )?;
        resp.json().map_err(|e| ApiError::Network(e.without_url().to_string()))
    }

    pub fn fetch_roster(&self, class_id: &str) -> Result<Vec<RosterStudent>, ApiError> {
        let resp = check(
            self.http
                .get(self.url(&format!("/api/classes/{}/students", class_id)))
                .send()
                .map_err(map_transport)?,
        )?;
        resp.json().map_err(|e| ApiError::Network(e.without_url().to_string()))
    }

    pub fn fetch_events(&self, class_id: &str) -> Result<Vec<AttendanceEvent>, ApiError> {
        let resp = check(
            self.http
                .get(self.url(&format!("/api/classes/{}/attendance", class_id)))
                .send()
                .map_err(map_transport)?,
        )?;
        resp.json().map_err(|e| ApiError::Network(e.without_url().to_string()))
    }

    /// Replace-by-key save of one report; the server keys on
    /// (classId, date) and must overwrite, never merge.
    pub fn save_report(&self, report: &AttendanceReport) -> Result<(), ApiError> {
        check(
            self.http
                .put(self.url("/api/reports"))
                .json(report)
                .send()
                .map_err(map_transport)?,
        )?;
        Ok(())
    }

    pub fn fetch_reports(
        &self,
        class_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceReport>, ApiError> {
        let from = from.to_string();
        let to = to.to_string();
        let resp = check(
            self.http
                .get(self.url("/api/reports"))
                .query(&[
                    ("classId", class_id),
                    ("from", from.as_str()),
                    ("to", to.as_str()),
                ])
                .send()
                .map_err(map_transport)?,
        )?;
        resp.json().map_err(|e| ApiError::Network(e.without_url().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_statuses_map_to_authentication_failed() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "nope".into()),
            ApiError::AuthenticationFailed
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "nope".into()),
            ApiError::AuthenticationFailed
        ));
    }

    #[test]
    fn enrollment_404_is_distinct_from_generic_404() {
        assert!(matches!(
            status_error(
                StatusCode::NOT_FOUND,
                "student is not enrolled in this class".into()
            ),
            ApiError::NotEnrolled
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "no such route".into()),
            ApiError::Server { status: 404, .. }
        ));
    }

    #[test]
    fn other_statuses_stay_server_errors() {
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, "boom".into()),
            ApiError::Server { status: 500, .. }
        ));
    }
}
