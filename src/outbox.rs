use crate::db;
use crate::model::AttendanceEvent;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

/// Fixed settings key the journal lives under, as one JSON array. The
/// Records view reads this regardless of remote sync state.
pub const JOURNAL_KEY: &str = "attendance.records";

/// Locally persisted mirror of an event. Purely a journal: it is never
/// reconciled against confirmed server events, so an offline scan that
/// later syncs can look duplicated next to its server twin. The event's
/// idempotency key is what lets a server-side pass collapse the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub local_id: String,
    pub queued_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AttendanceEvent,
}

fn read_all(conn: &Connection) -> anyhow::Result<Vec<OutboxEntry>> {
    match db::settings_get_json(conn, JOURNAL_KEY)? {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(Vec::new()),
    }
}

/// Append one entry. Stored order is oldest-first; reads reverse it.
pub fn append(conn: &Connection, entry: &OutboxEntry) -> anyhow::Result<()> {
    let mut entries = read_all(conn)?;
    entries.push(entry.clone());
    db::settings_set_json(conn, JOURNAL_KEY, &serde_json::to_value(&entries)?)
}

/// Entries newest-first, for the Records display.
pub fn list(conn: &Connection) -> anyhow::Result<Vec<OutboxEntry>> {
    let mut entries = read_all(conn)?;
    entries.reverse();
    Ok(entries)
}

/// Explicit user action; wipes the journal only, never server data.
pub fn clear(conn: &Connection) -> anyhow::Result<usize> {
    let n = read_all(conn)?.len();
    db::settings_delete(conn, JOURNAL_KEY)?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttendanceStatus, RecordedVia};
    use chrono::TimeZone;

    fn entry(n: u32) -> OutboxEntry {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, n).unwrap();
        OutboxEntry {
            local_id: format!("local-{}", n),
            queued_at: t,
            event: AttendanceEvent {
                class_id: "C1".into(),
                student_id: format!("S{}", n),
                student_name: None,
                timestamp: t,
                status: AttendanceStatus::Present,
                recorded_via: RecordedVia::Qr,
                idempotency_key: format!("key-{}", n),
                device_info: None,
                location: None,
            },
        }
    }

    fn conn() -> Connection {
        let c = Connection::open_in_memory().expect("open");
        crate::db::init_schema(&c).expect("schema");
        c
    }

    #[test]
    fn append_then_list_newest_first() {
        let c = conn();
        append(&c, &entry(1)).expect("append");
        append(&c, &entry(2)).expect("append");
        append(&c, &entry(3)).expect("append");

        let got = list(&c).expect("list");
        let ids: Vec<&str> = got.iter().map(|e| e.event.student_id.as_str()).collect();
        assert_eq!(ids, ["S3", "S2", "S1"]);
    }

    #[test]
    fn journal_is_one_json_array_under_the_fixed_key() {
        let c = conn();
        append(&c, &entry(1)).expect("append");

        let raw = crate::db::settings_get_json(&c, JOURNAL_KEY)
            .expect("get")
            .expect("present");
        let arr = raw.as_array().expect("array");
        assert_eq!(arr.len(), 1);
        // Flattened record shape: event fields sit beside the local ones.
        assert_eq!(arr[0]["studentId"], "S1");
        assert_eq!(arr[0]["localId"], "local-1");
        assert_eq!(arr[0]["status"], "present");
    }

    #[test]
    fn clear_empties_and_reports_count() {
        let c = conn();
        append(&c, &entry(1)).expect("append");
        append(&c, &entry(2)).expect("append");
        assert_eq!(clear(&c).expect("clear"), 2);
        assert!(list(&c).expect("list").is_empty());
        assert_eq!(clear(&c).expect("clear again"), 0);
    }
}
