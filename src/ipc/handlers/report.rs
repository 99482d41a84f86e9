use crate::calc::CalcError;
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::types::{AppState, Request};
use crate::labels;
use crate::marks::{self, BandThresholds, MarkBand};
use crate::report::{self, Report};
use crate::view::ReportView;
use chrono::Utc;
use serde_json::json;

fn required_students(req: &Request) -> Result<Vec<serde_json::Value>, serde_json::Value> {
    req.params
        .get("students")
        .and_then(|v| v.as_array())
        .cloned()
        .ok_or_else(|| err(&req.id, "bad_params", "missing students", None))
}

fn parse_band(req: &Request) -> Result<Option<MarkBand>, serde_json::Value> {
    let raw = match req.params.get("markBand") {
        None => return Ok(None),
        Some(v) if v.is_null() => return Ok(None),
        Some(v) => v,
    };
    if !raw.is_object() {
        return Err(err(&req.id, "bad_params", "markBand must be an object", None));
    }
    let thresholds: BandThresholds = serde_json::from_value(raw.clone()).map_err(|e| {
        err(
            &req.id,
            "bad_params",
            format!("markBand: {e}"),
            Some(raw.clone()),
        )
    })?;
    MarkBand::new(thresholds)
        .map(Some)
        .map_err(|e| calc_err(req, e))
}

fn required_band(req: &Request) -> Result<MarkBand, serde_json::Value> {
    parse_band(req)?.ok_or_else(|| err(&req.id, "bad_params", "missing markBand", None))
}

/// An absent `markThreshold` means "the lower boundary of mark 3"; an explicit
/// null or non-integer turns the boundary check off.
fn parse_mark_threshold(req: &Request, band: Option<&MarkBand>) -> Option<i64> {
    match req.params.get("markThreshold") {
        None => band.and_then(|b| b.min_points_for(3)),
        Some(v) => v.as_i64(),
    }
}

fn build_report(req: &Request) -> Result<Report, serde_json::Value> {
    let students = required_students(req)?;
    let band = parse_band(req)?;
    let threshold = parse_mark_threshold(req, band.as_ref());
    report::generate_report(students, band.as_ref(), threshold).map_err(|e| calc_err(req, e))
}

fn to_json<T: serde::Serialize>(req: &Request, v: &T) -> Result<serde_json::Value, serde_json::Value> {
    serde_json::to_value(v).map_err(|e| calc_err(req, CalcError::new("internal", e.to_string())))
}

fn handle_marks_assign(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let students = match required_students(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let band = match required_band(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match marks::assign_exam_marks(students, &band) {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => calc_err(req, e),
    }
}

fn handle_report_generate(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let report = match build_report(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let use_labels = req
        .params
        .get("labels")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let body = if use_labels {
        labels::translate(&report)
            .map(serde_json::Value::Object)
            .map_err(|e| calc_err(req, CalcError::new("internal", e.to_string())))
    } else {
        to_json(req, &report)
    };
    match body {
        Ok(body) => ok(
            &req.id,
            json!({
                "report": body,
                "generatedAt": Utc::now().to_rfc3339(),
            }),
        ),
        Err(e) => e,
    }
}

fn handle_report_view(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let report = match build_report(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match to_json(req, &ReportView::from_report(&report)) {
        Ok(view) => ok(&req.id, json!({ "view": view })),
        Err(e) => e,
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.assign" => Some(handle_marks_assign(state, req)),
        "report.generate" => Some(handle_report_generate(state, req)),
        "report.view" => Some(handle_report_view(state, req)),
        _ => None,
    }
}
