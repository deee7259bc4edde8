use crate::model::AttendanceReport;
use serde::Serialize;

/// Rounded whole-number percentage; an empty total yields 0 rather than a
/// division error.
pub fn percentage(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((part as f64 / total as f64) * 100.0).round() as u32
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceOverview {
    pub days: usize,
    pub total_students: usize,
    pub present: usize,
    pub absent: usize,
    pub present_percentage: u32,
    pub absent_percentage: u32,
}

/// Sum a window of daily reports into the overview card numbers. Pure
/// aggregation: the reports are whatever the caller fetched (e.g. the last
/// seven days of one class).
pub fn overview(reports: &[AttendanceReport]) -> AttendanceOverview {
    let mut total_students = 0usize;
    let mut present = 0usize;
    let mut absent = 0usize;
    for report in reports {
        total_students += report.total_students;
        present += report.present_count;
        absent += report.absent_count;
    }
    AttendanceOverview {
        days: reports.len(),
        total_students,
        present,
        absent,
        present_percentage: percentage(present, total_students),
        absent_percentage: percentage(absent, total_students),
    }
}
