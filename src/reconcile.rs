use crate::model::{
    AttendanceEvent, AttendanceReport, AttendanceStatus, ClassInfo, ReportStudent, RosterStudent,
};
use crate::net::ApiClient;
use chrono::NaiveDate;
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

/// Events bucketed by the UTC calendar date of their timestamp. One
/// consistent calendar for every device, never local time.
pub fn group_by_date(events: &[AttendanceEvent]) -> BTreeMap<NaiveDate, Vec<&AttendanceEvent>> {
    let mut groups: BTreeMap<NaiveDate, Vec<&AttendanceEvent>> = BTreeMap::new();
    for event in events {
        groups
            .entry(event.timestamp.date_naive())
            .or_default()
            .push(event);
    }
    groups
}

/// Build the authoritative report for one (class, date): every roster
/// student appears, in roster order; a student's most recent event that day
/// decides their status, present only when it says `present` (late and
/// manual absences both land in the absent bucket); no events means absent.
pub fn build_report(
    class: &ClassInfo,
    roster: &[RosterStudent],
    date: NaiveDate,
    events: &[&AttendanceEvent],
) -> AttendanceReport {
    let mut students = Vec::with_capacity(roster.len());
    let mut present_count = 0usize;

    for member in roster {
        let latest = events
            .iter()
            .filter(|e| e.student_id == member.student_id)
            .max_by_key(|e| e.timestamp);
        let status = match latest {
            Some(e) if e.status == AttendanceStatus::Present => AttendanceStatus::Present,
            _ => AttendanceStatus::Absent,
        };
        if status == AttendanceStatus::Present {
            present_count += 1;
        }
        students.push(ReportStudent {
            student_id: member.student_id.clone(),
            student_name: member.display_name(),
            status,
        });
    }

    let total_students = students.len();
    AttendanceReport {
        date,
        class_id: class.id.clone(),
        class_name: class.name.clone(),
        subject_code: class.subject_code.clone(),
        total_students,
        present_count,
        absent_count: total_students - present_count,
        students,
    }
}

#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassOutcome {
    pub class_id: String,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub classes: Vec<ClassOutcome>,
}

/// Reconcile one class: fetch its events and roster, then replace the
/// report for every date that has events. A failed date is counted and
/// logged, never propagated, so the remaining dates still run.
pub fn reconcile_class(api: &ApiClient, class: &ClassInfo) -> ClassOutcome {
    let mut outcome = ClassOutcome {
        class_id: class.id.clone(),
        ..Default::default()
    };

    let (events, roster) = match (api.fetch_events(&class.id), api.fetch_roster(&class.id)) {
        (Ok(events), Ok(roster)) => (events, roster),
        (Err(e), _) | (_, Err(e)) => {
            warn!("reconcile: fetch failed for class {}: {}", class.id, e);
            outcome.failed = 1;
            return outcome;
        }
    };

    for (date, day_events) in group_by_date(&events) {
        let report = build_report(class, &roster, date, &day_events);
        match api.save_report(&report) {
            Ok(()) => outcome.succeeded += 1,
            Err(e) => {
                warn!(
                    "reconcile: report save failed for {}/{}: {}",
                    class.id, date, e
                );
                outcome.failed += 1;
            }
        }
    }
    outcome
}

/// Run the engine across classes, sequentially, each class isolated from
/// the others' failures.
pub fn reconcile_all(api: &ApiClient, classes: &[ClassInfo]) -> ReconcileSummary {
    let mut summary = ReconcileSummary::default();
    for class in classes {
        let outcome = reconcile_class(api, class);
        summary.succeeded += outcome.succeeded;
        summary.failed += outcome.failed;
        summary.classes.push(outcome);
    }
    info!(
        "reconcile finished: {} report(s) written, {} failure(s)",
        summary.succeeded, summary.failed
    );
    summary
}
