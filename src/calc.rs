use crate::roster::{Mark, Roster, StudentRecord, TASK_PREFIX, UNSET};
use crate::verify::{Verdict, Verification};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

pub const QUALITY_MARKS: &[i64] = &[4, 5];
pub const SUCCESS_MARKS: &[i64] = &[3, 4, 5];
pub const CRITICAL_MISTAKE_PERCENTAGE: f64 = 20.0;
pub const NO_MISTAKES: &str = "отсутствуют";
pub const TASK_LABEL: &str = "Задание ";

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Two decimal places, exact halves to the even digit (3.125 -> 3.12).
pub fn round_2(x: f64) -> f64 {
    (x * 100.0).round_ties_even() / 100.0
}

/// `part / whole * 100` rounded to two places. Zero when either side is zero.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if part == 0 || whole == 0 {
        return 0.0;
    }
    round_2(part as f64 / whole as f64 * 100.0)
}

fn average(sum: i64, count: usize) -> f64 {
    if sum == 0 || count == 0 {
        return 0.0;
    }
    round_2(sum as f64 / count as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkField {
    ThirdQuarter,
    Exam,
}

impl MarkField {
    pub fn of(self, s: &StudentRecord) -> Mark {
        match self {
            MarkField::ThirdQuarter => s.third_quarter,
            MarkField::Exam => s.exam_mark,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateKind {
    Quality,
    Success,
}

impl RateKind {
    pub fn good_marks(self) -> &'static [i64] {
        match self {
            RateKind::Quality => QUALITY_MARKS,
            RateKind::Success => SUCCESS_MARKS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDirection {
    Improve,
    Reduce,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentMarks {
    pub student_name: String,
    pub exam_mark: Mark,
    pub exam_points: Mark,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkChange {
    pub percent: f64,
    pub count: usize,
}

impl fmt::Display for MarkChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}% ({} чел.)", self.percent, self.count)
    }
}

impl Serialize for MarkChange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("MarkChange", 3)?;
        st.serialize_field("percent", &self.percent)?;
        st.serialize_field("count", &self.count)?;
        st.serialize_field("display", &self.to_string())?;
        st.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskMistakes {
    pub label: String,
    pub count: usize,
    pub percent: f64,
}

impl fmt::Display for TaskMistakes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}%", self.count, self.percent)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PopularMistakes {
    None,
    Tasks(Vec<TaskMistakes>),
}

impl Serialize for PopularMistakes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PopularMistakes::None => serializer.serialize_str(NO_MISTAKES),
            PopularMistakes::Tasks(tasks) => {
                let mut map = serializer.serialize_map(Some(tasks.len()))?;
                for t in tasks {
                    map.serialize_entry(&t.label, &t.to_string())?;
                }
                map.end()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Count(usize),
    Number(f64),
    Students(Vec<StudentMarks>),
    Histogram(BTreeMap<i64, usize>),
    Change(MarkChange),
    Mistakes(PopularMistakes),
    Verdict(Verdict),
}

/// One rule of the analysis. Each variant carries its fixed configuration and
/// has a stable technical name used as the report key.
#[derive(Debug, Clone, PartialEq)]
pub enum Metric {
    TotalStudents,
    StudentsPresent,
    StudentsAbsent,
    StudentList,
    MarkCounts(MarkField),
    Rate(RateKind, MarkField),
    AverageMark(MarkField),
    AverageSolvedTasks,
    MarkChange(ChangeDirection),
    PopularMistakes,
    Reliability(Vec<Verification>),
}

impl Metric {
    pub fn name(&self) -> &'static str {
        use ChangeDirection::*;
        use MarkField::*;
        use RateKind::*;
        match self {
            Metric::TotalStudents => "total_students",
            Metric::StudentsPresent => "students_present_exam",
            Metric::StudentsAbsent => "students_absent_exam",
            Metric::StudentList => "list_students_and_marks",
            Metric::MarkCounts(ThirdQuarter) => "marks_3rd_quarter",
            Metric::MarkCounts(Exam) => "marks_exam",
            Metric::Rate(Quality, ThirdQuarter) => "quality_third_quarter",
            Metric::Rate(Quality, Exam) => "quality_exam",
            Metric::Rate(Success, ThirdQuarter) => "success_third_quarter",
            Metric::Rate(Success, Exam) => "success_exam",
            Metric::AverageMark(ThirdQuarter) => "average_mark_third_quarter",
            Metric::AverageMark(Exam) => "average_mark_exam",
            Metric::AverageSolvedTasks => "average_solved_exam_tasks",
            Metric::MarkChange(Improve) => "improve_mark",
            Metric::MarkChange(Reduce) => "reduce_mark",
            Metric::PopularMistakes => "popular_mistakes",
            Metric::Reliability(_) => "verification_results",
        }
    }

    pub fn calculate(&self, roster: &Roster) -> MetricValue {
        match self {
            Metric::TotalStudents => MetricValue::Count(roster.all().len()),
            Metric::StudentsPresent => MetricValue::Count(roster.present_count()),
            Metric::StudentsAbsent => MetricValue::Count(roster.absent_count()),
            Metric::StudentList => MetricValue::Students(student_list(roster)),
            Metric::MarkCounts(field) => MetricValue::Histogram(mark_counts(roster, *field)),
            Metric::Rate(kind, field) => MetricValue::Number(good_mark_rate(roster, *field, *kind)),
            Metric::AverageMark(field) => MetricValue::Number(average_mark(roster, *field)),
            Metric::AverageSolvedTasks => MetricValue::Number(average_solved_tasks(roster)),
            Metric::MarkChange(dir) => MetricValue::Change(mark_change(roster, *dir)),
            Metric::PopularMistakes => MetricValue::Mistakes(popular_mistakes(roster)),
            Metric::Reliability(checks) => MetricValue::Verdict(Verdict::run(checks, roster)),
        }
    }
}

pub fn student_list(roster: &Roster) -> Vec<StudentMarks> {
    roster
        .all()
        .iter()
        .map(|s| StudentMarks {
            student_name: s.name.clone(),
            exam_mark: s.exam_mark,
            exam_points: if s.present {
                Mark::Value(s.exam_points())
            } else {
                Mark::Unset
            },
        })
        .collect()
}

/// Unset marks land in bucket 0, so the counts always add up to the number
/// of present students.
pub fn mark_counts(roster: &Roster, field: MarkField) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for s in roster {
        *counts.entry(field.of(s).points()).or_insert(0) += 1;
    }
    counts
}

pub fn good_mark_rate(roster: &Roster, field: MarkField, kind: RateKind) -> f64 {
    let good = kind.good_marks();
    let n = roster
        .iter()
        .filter(|s| field.of(s).value().is_some_and(|m| good.contains(&m)))
        .count();
    percentage(n, roster.present_count())
}

// TODO: an empty roster and an all-zero roster both report 0 here; return
// Option<f64> once the report view can render "no data".
pub fn average_mark(roster: &Roster, field: MarkField) -> f64 {
    let sum: i64 = roster.iter().map(|s| field.of(s).points()).sum();
    average(sum, roster.present_count())
}

pub fn average_solved_tasks(roster: &Roster) -> f64 {
    let solved: usize = roster.iter().map(StudentRecord::solved_tasks).sum();
    average(solved as i64, roster.present_count())
}

pub fn mark_change(roster: &Roster, dir: ChangeDirection) -> MarkChange {
    let count = roster
        .iter()
        .filter(|s| {
            let exam = s.exam_mark.points();
            let quarter = s.third_quarter.points();
            match dir {
                ChangeDirection::Improve => exam > quarter,
                ChangeDirection::Reduce => exam < quarter,
            }
        })
        .count();
    MarkChange {
        percent: percentage(count, roster.present_count()),
        count,
    }
}

pub fn task_label(key: &str) -> String {
    match key.strip_prefix(TASK_PREFIX) {
        Some(n) => format!("{TASK_LABEL}{n}"),
        None => key.to_string(),
    }
}

/// Tasks scored 0 by at least 20% of present students. The task list comes
/// from the first present student.
pub fn popular_mistakes(roster: &Roster) -> PopularMistakes {
    let present = roster.present();
    let Some(sample) = present.first() else {
        return PopularMistakes::None;
    };

    let mut tasks = Vec::new();
    for task in &sample.tasks {
        let count = present
            .iter()
            .filter(|s| s.task_score(&task.key) == 0)
            .count();
        let percent = percentage(count, present.len());
        if percent >= CRITICAL_MISTAKE_PERCENTAGE {
            tasks.push(TaskMistakes {
                label: task_label(&task.key),
                count,
                percent,
            });
        }
    }

    if tasks.is_empty() {
        PopularMistakes::None
    } else {
        PopularMistakes::Tasks(tasks)
    }
}

impl MetricValue {
    /// Plain display text, for values the report view shows as a single cell.
    pub fn display(&self) -> String {
        match self {
            MetricValue::Count(n) => n.to_string(),
            MetricValue::Number(x) => x.to_string(),
            MetricValue::Change(c) => c.to_string(),
            MetricValue::Verdict(v) => v.to_string(),
            MetricValue::Mistakes(PopularMistakes::None) => NO_MISTAKES.to_string(),
            MetricValue::Students(_) | MetricValue::Histogram(_) | MetricValue::Mistakes(_) => {
                UNSET.to_string()
            }
        }
    }
}
