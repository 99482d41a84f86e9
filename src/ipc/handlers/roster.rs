use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::types::{AppState, Request};
use crate::roster;
use serde_json::json;

fn required_i64(req: &Request, key: &str) -> Result<i64, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn parse_template_params(req: &Request) -> Result<(i64, i64, i64), serde_json::Value> {
    Ok((
        required_i64(req, "grade")?,
        required_i64(req, "studentsCount")?,
        required_i64(req, "exercisesCount")?,
    ))
}

fn handle_roster_template(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let (grade, students_count, exercises_count) = match parse_template_params(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    match roster::template_records(grade, students_count, exercises_count) {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => calc_err(req, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.template" => Some(handle_roster_template(state, req)),
        _ => None,
    }
}
