use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{api_error_response, required_str, server_config};
use crate::ipc::types::{AppState, Request};
use crate::{reconcile, stats};
use chrono::{Duration, Utc};
use serde_json::json;

fn handle_reports_reconcile(state: &mut AppState, req: &Request) -> serde_json::Value {
    let cfg = server_config(state, req);
    let base = match cfg.resolve() {
        Ok(base) => base,
        Err(e) => return api_error_response(&req.id, &e),
    };
    let api = match cfg.client(&base) {
        Ok(api) => api,
        Err(e) => return api_error_response(&req.id, &e),
    };
    state.active_base = Some(base);

    let mut classes = match api.fetch_classes() {
        Ok(classes) => classes,
        Err(e) => return api_error_response(&req.id, &e),
    };
    if let Some(filter) = req.params.get("classIds").and_then(|v| v.as_array()) {
        let wanted: Vec<&str> = filter.iter().filter_map(|v| v.as_str()).collect();
        classes.retain(|c| wanted.contains(&c.id.as_str()));
    }

    let summary = reconcile::reconcile_all(&api, &classes);
    match serde_json::to_value(&summary) {
        Ok(value) => ok(&req.id, value),
        Err(e) => err(&req.id, "internal", e.to_string(), None),
    }
}

fn handle_reports_overview(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let days = req
        .params
        .get("days")
        .and_then(|v| v.as_i64())
        .unwrap_or(7)
        .max(1);

    let cfg = server_config(state, req);
    let api = match cfg.connect() {
        Ok(api) => api,
        Err(e) => return api_error_response(&req.id, &e),
    };
    state.active_base = Some(api.base().to_string());

    let to = Utc::now().date_naive();
    let from = to - Duration::days(days - 1);
    let reports = match api.fetch_reports(&class_id, from, to) {
        Ok(reports) => reports,
        Err(e) => return api_error_response(&req.id, &e),
    };

    let overview = stats::overview(&reports);
    match serde_json::to_value(&overview) {
        Ok(mut value) => {
            value["from"] = json!(from.to_string());
            value["to"] = json!(to.to_string());
            ok(&req.id, value)
        }
        Err(e) => err(&req.id, "internal", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.reconcile" => Some(handle_reports_reconcile(state, req)),
        "reports.overview" => Some(handle_reports_overview(state, req)),
        _ => None,
    }
}
