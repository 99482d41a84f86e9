use crate::calc::CalcError;
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::cell::OnceCell;

pub const TASK_PREFIX: &str = "task_";
pub const UNKNOWN_NAME: &str = "Неизвестный";
pub const UNSET: &str = "-";

pub const FIELD_NAME: &str = "student_name";
pub const FIELD_PRESENT: &str = "is_present";
pub const FIELD_THIRD_QUARTER: &str = "third_quarter";
pub const FIELD_EXAM_MARK: &str = "exam_mark";

pub type RawRecord = Map<String, Value>;

/// A mark as entered on the form. Unset marks serialize as `"-"` and count
/// as 0 wherever marks are summed or compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Value(i64),
    Unset,
}

impl Mark {
    fn from_raw(v: Option<&Value>) -> Self {
        match v.and_then(|v| v.as_i64()) {
            Some(n) => Mark::Value(n),
            None => Mark::Unset,
        }
    }

    pub fn points(self) -> i64 {
        match self {
            Mark::Value(n) => n,
            Mark::Unset => 0,
        }
    }

    pub fn value(self) -> Option<i64> {
        match self {
            Mark::Value(n) => Some(n),
            Mark::Unset => None,
        }
    }
}

impl Serialize for Mark {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Mark::Value(n) => serializer.serialize_i64(*n),
            Mark::Unset => serializer.serialize_str(UNSET),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskScore {
    pub key: String,
    pub score: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub name: String,
    pub present: bool,
    pub third_quarter: Mark,
    pub exam_mark: Mark,
    pub tasks: Vec<TaskScore>,
}

impl StudentRecord {
    /// Sum of the integer task scores. Absent students have no tasks, so this
    /// is 0 for them.
    pub fn exam_points(&self) -> i64 {
        self.tasks.iter().filter_map(|t| t.score).sum()
    }

    pub fn task_score(&self, key: &str) -> i64 {
        self.tasks
            .iter()
            .find(|t| t.key == key)
            .and_then(|t| t.score)
            .unwrap_or(0)
    }

    pub fn solved_tasks(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.score.unwrap_or(0) > 0)
            .count()
    }
}

pub fn is_task_key(key: &str) -> bool {
    key.starts_with(TASK_PREFIX)
}

pub fn as_record<'a>(raw: &'a Value, index: usize) -> Result<&'a RawRecord, CalcError> {
    raw.as_object().ok_or_else(|| {
        CalcError::new("malformed_record", "student record must be an object")
            .with_details(json!({ "index": index }))
    })
}

/// Sum of the integer-valued `task_` fields of a raw record.
pub fn raw_exam_points(record: &RawRecord) -> i64 {
    record
        .iter()
        .filter(|(k, _)| is_task_key(k))
        .filter_map(|(_, v)| v.as_i64())
        .sum()
}

pub fn raw_is_present(record: &RawRecord) -> bool {
    record
        .get(FIELD_PRESENT)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

pub fn normalize_record(record: &RawRecord) -> StudentRecord {
    let name = record
        .get(FIELD_NAME)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_NAME)
        .to_string();
    let present = raw_is_present(record);

    // Absent students must not leak task data into mistake/point statistics.
    let tasks = if present {
        record
            .iter()
            .filter(|(k, _)| is_task_key(k))
            .map(|(k, v)| TaskScore {
                key: k.clone(),
                score: v.as_i64(),
            })
            .collect()
    } else {
        Vec::new()
    };

    StudentRecord {
        name,
        present,
        third_quarter: Mark::from_raw(record.get(FIELD_THIRD_QUARTER)),
        exam_mark: Mark::from_raw(record.get(FIELD_EXAM_MARK)),
        tasks,
    }
}

#[derive(Debug, Default)]
pub struct Roster {
    all: Vec<StudentRecord>,
    present: OnceCell<Vec<StudentRecord>>,
}

impl Roster {
    pub fn new(records: Vec<StudentRecord>) -> Self {
        Self {
            all: records,
            present: OnceCell::new(),
        }
    }

    pub fn from_raw(raw: &[Value]) -> Result<Self, CalcError> {
        let mut records = Vec::with_capacity(raw.len());
        for (i, v) in raw.iter().enumerate() {
            records.push(normalize_record(as_record(v, i)?));
        }
        Ok(Self::new(records))
    }

    pub fn all(&self) -> &[StudentRecord] {
        &self.all
    }

    pub fn present(&self) -> &[StudentRecord] {
        self.present
            .get_or_init(|| self.all.iter().filter(|s| s.present).cloned().collect())
    }

    pub fn present_count(&self) -> usize {
        self.present().len()
    }

    pub fn absent_count(&self) -> usize {
        self.all.len() - self.present_count()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StudentRecord> {
        self.present().iter()
    }
}

impl<'a> IntoIterator for &'a Roster {
    type Item = &'a StudentRecord;
    type IntoIter = std::slice::Iter<'a, StudentRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub const MAX_GRADE: i64 = 11;
pub const MAX_STUDENTS: i64 = 40;
pub const MAX_EXERCISES: i64 = 30;

fn check_range(name: &str, v: i64, max: i64) -> Result<(), CalcError> {
    if (1..=max).contains(&v) {
        return Ok(());
    }
    Err(
        CalcError::new("bad_params", format!("{name} must be between 1 and {max}"))
            .with_details(json!({ "field": name, "value": v })),
    )
}

/// Blank roster for the data-entry step: placeholder names are
/// `grade * 10000 + n`, everyone present, every task at 0.
pub fn template_records(
    grade: i64,
    students_count: i64,
    exercises_count: i64,
) -> Result<Vec<Value>, CalcError> {
    check_range("grade", grade, MAX_GRADE)?;
    check_range("studentsCount", students_count, MAX_STUDENTS)?;
    check_range("exercisesCount", exercises_count, MAX_EXERCISES)?;

    let base = grade * 10000;
    let out = (1..=students_count)
        .map(|i| {
            let mut rec = Map::new();
            rec.insert(FIELD_NAME.into(), json!((base + i).to_string()));
            rec.insert(FIELD_PRESENT.into(), json!(true));
            rec.insert(FIELD_THIRD_QUARTER.into(), Value::Null);
            for t in 1..=exercises_count {
                rec.insert(format!("{TASK_PREFIX}{t}"), json!(0));
            }
            Value::Object(rec)
        })
        .collect();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(v: Value) -> RawRecord {
        v.as_object().cloned().expect("object")
    }

    #[test]
    fn normalize_fills_defaults() {
        let s = normalize_record(&raw(json!({ "extra": 1 })));
        assert_eq!(s.name, UNKNOWN_NAME);
        assert!(!s.present);
        assert_eq!(s.third_quarter, Mark::Unset);
        assert_eq!(s.exam_mark, Mark::Unset);
        assert!(s.tasks.is_empty());
    }

    #[test]
    fn normalize_drops_tasks_of_absent_students() {
        let s = normalize_record(&raw(json!({
            "student_name": "Ivanov",
            "is_present": false,
            "third_quarter": 4,
            "task_1": 2,
            "task_2": 0
        })));
        assert_eq!(s.third_quarter, Mark::Value(4));
        assert!(s.tasks.is_empty());
        assert_eq!(s.exam_points(), 0);
    }

    #[test]
    fn normalize_keeps_task_order_and_missing_values() {
        let s = normalize_record(&raw(json!({
            "is_present": true,
            "task_1": 2,
            "task_10": null,
            "task_2": 1,
            "comment": "x"
        })));
        let keys: Vec<_> = s.tasks.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["task_1", "task_10", "task_2"]);
        assert_eq!(s.tasks[1].score, None);
        assert_eq!(s.exam_points(), 3);
        assert_eq!(s.task_score("task_10"), 0);
        assert_eq!(s.solved_tasks(), 2);
    }

    #[test]
    fn presence_requires_literal_true() {
        assert!(!raw_is_present(&raw(json!({ "is_present": "yes" }))));
        assert!(!raw_is_present(&raw(json!({ "is_present": 1 }))));
        assert!(raw_is_present(&raw(json!({ "is_present": true }))));
    }

    #[test]
    fn roster_views() {
        let roster = Roster::from_raw(&[
            json!({ "is_present": true, "third_quarter": 4, "exam_mark": 5 }),
            json!({ "is_present": false }),
        ])
        .expect("roster");
        assert_eq!(roster.all().len(), 2);
        assert_eq!(roster.present().len(), 1);
        assert_eq!(roster.absent_count(), 1);
        assert_eq!((&roster).into_iter().count(), 1);
        assert!(std::ptr::eq(roster.present(), roster.present()));
    }

    #[test]
    fn empty_roster_is_legal() {
        let roster = Roster::from_raw(&[]).expect("roster");
        assert!(roster.all().is_empty());
        assert!(roster.present().is_empty());
    }

    #[test]
    fn non_object_record_is_malformed() {
        let e = Roster::from_raw(&[json!({}), json!([1, 2])]).expect_err("malformed");
        assert_eq!(e.code, "malformed_record");
        assert_eq!(e.details, Some(json!({ "index": 1 })));
    }

    #[test]
    fn template_names_and_tasks() {
        let rows = template_records(7, 3, 2).expect("template");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["student_name"], json!("70001"));
        assert_eq!(rows[2]["student_name"], json!("70003"));
        assert_eq!(rows[1]["task_2"], json!(0));
        assert_eq!(rows[1]["is_present"], json!(true));
    }

    #[test]
    fn template_rejects_out_of_range() {
        assert_eq!(template_records(12, 3, 2).expect_err("grade").code, "bad_params");
        assert!(template_records(5, 41, 2).is_err());
        assert!(template_records(5, 10, 0).is_err());
    }
}
