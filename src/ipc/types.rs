use crate::scan::ScanSession;
use rusqlite::Connection;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Identity the UI hands us after login. The token is whatever the auth
/// subsystem issued; we only store, attach, and invalidate it.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub student_id: String,
    pub student_name: Option<String>,
    pub token: Option<String>,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub scan: ScanSession,
    pub user: Option<SessionUser>,
    /// Last base address a probe confirmed, overwritten on each success.
    pub active_base: Option<String>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            scan: ScanSession::default(),
            user: None,
            active_base: None,
        }
    }
}
