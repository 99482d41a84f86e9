use crate::calc::{CalcError, ChangeDirection, MarkField, Metric, MetricValue, RateKind};
use crate::marks::{assign_exam_marks, MarkBand};
use crate::roster::Roster;
use crate::verify::Verification;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct MetricResult {
    pub name: &'static str,
    pub value: MetricValue,
}

/// Metric results in configured order. Serializes as a JSON object whose key
/// order matches the metric list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Report {
    results: Vec<MetricResult>,
}

impl Report {
    pub fn results(&self) -> &[MetricResult] {
        &self.results
    }

    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.results
            .iter()
            .find(|r| r.name == name)
            .map(|r| &r.value)
    }
}

impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.results.len()))?;
        for r in &self.results {
            map.serialize_entry(r.name, &r.value)?;
        }
        map.end()
    }
}

pub struct MetricsController {
    metrics: Vec<Metric>,
}

impl MetricsController {
    pub fn new(metrics: Vec<Metric>) -> Self {
        Self { metrics }
    }

    pub fn run(&self, roster: &Roster) -> Report {
        let results = self
            .metrics
            .iter()
            .map(|m| {
                let value = m.calculate(roster);
                tracing::debug!(metric = m.name(), value = ?value, "metric calculated");
                MetricResult {
                    name: m.name(),
                    value,
                }
            })
            .collect();
        Report { results }
    }
}

pub fn default_verifications(mark_threshold: Option<i64>) -> Vec<Verification> {
    vec![
        Verification::Attendance,
        Verification::MarkDrift,
        Verification::threshold_boundary(mark_threshold),
    ]
}

pub fn default_metrics(mark_threshold: Option<i64>) -> Vec<Metric> {
    use MarkField::{Exam, ThirdQuarter};
    vec![
        Metric::TotalStudents,
        Metric::StudentsPresent,
        Metric::StudentsAbsent,
        Metric::StudentList,
        Metric::MarkCounts(ThirdQuarter),
        Metric::MarkCounts(Exam),
        Metric::Rate(RateKind::Quality, ThirdQuarter),
        Metric::Rate(RateKind::Quality, Exam),
        Metric::Rate(RateKind::Success, ThirdQuarter),
        Metric::Rate(RateKind::Success, Exam),
        Metric::AverageMark(ThirdQuarter),
        Metric::AverageMark(Exam),
        Metric::AverageSolvedTasks,
        Metric::MarkChange(ChangeDirection::Improve),
        Metric::MarkChange(ChangeDirection::Reduce),
        Metric::PopularMistakes,
        Metric::Reliability(default_verifications(mark_threshold)),
    ]
}

/// Full pipeline: optional mark assignment, normalization, every default
/// metric.
pub fn generate_report(
    students: Vec<Value>,
    band: Option<&MarkBand>,
    mark_threshold: Option<i64>,
) -> Result<Report, CalcError> {
    let students = match band {
        Some(b) => assign_exam_marks(students, b)?,
        None => students,
    };
    let roster = Roster::from_raw(&students)?;
    let report = MetricsController::new(default_metrics(mark_threshold)).run(&roster);

    let reliable = report.results().iter().find_map(|r| match &r.value {
        MetricValue::Verdict(v) => Some(v.is_reliable()),
        _ => None,
    });
    tracing::info!(
        total = roster.all().len(),
        present = roster.present_count(),
        metrics = report.results().len(),
        reliable = ?reliable,
        "report generated"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marks::BandThresholds;
    use serde_json::json;

    fn band() -> MarkBand {
        MarkBand::new(BandThresholds {
            points_for_3: Some(6),
            points_for_4: Some(9),
            points_for_5: Some(13),
        })
        .expect("band")
    }

    fn class() -> Vec<Value> {
        vec![
            json!({ "student_name": "A", "is_present": true, "third_quarter": 4, "task_1": 2, "task_2": 2, "task_3": 2, "task_4": 2, "task_5": 1 }),
            json!({ "student_name": "B", "is_present": true, "third_quarter": 3, "task_1": 2, "task_2": 2, "task_3": 2, "task_4": 0, "task_5": 0 }),
            json!({ "student_name": "C", "is_present": true, "third_quarter": 5, "task_1": 2, "task_2": 2, "task_3": 2, "task_4": 2, "task_5": 2, "task_6": 2, "task_7": 1 }),
            json!({ "student_name": "D", "is_present": false, "third_quarter": 3 }),
        ]
    }

    #[test]
    fn report_keeps_metric_order() {
        let report = generate_report(class(), Some(&band()), Some(6)).expect("report");
        let names: Vec<_> = report.results().iter().map(|r| r.name).collect();
        let expected: Vec<_> = default_metrics(None).iter().map(Metric::name).collect();
        assert_eq!(names, expected);

        let v = serde_json::to_value(&report).expect("json");
        let keys: Vec<_> = v.as_object().expect("object").keys().cloned().collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn report_values() {
        let report = generate_report(class(), Some(&band()), Some(6)).expect("report");
        assert_eq!(report.get("total_students"), Some(&MetricValue::Count(4)));
        assert_eq!(report.get("students_present_exam"), Some(&MetricValue::Count(3)));
        // A: 9 points -> 4, B: 6 -> 3, C: 13 -> 5
        let v = serde_json::to_value(&report).expect("json");
        assert_eq!(v["marks_exam"], json!({ "3": 1, "4": 1, "5": 1 }));
        assert_eq!(v["quality_exam"], json!(66.67));
        assert_eq!(v["success_exam"], json!(100.0));
        assert_eq!(v["average_mark_exam"], json!(4.0));
        assert_eq!(v["average_mark_third_quarter"], json!(4.0));
        assert_eq!(v["improve_mark"]["display"], json!("0% (0 чел.)"));
        assert_eq!(v["reduce_mark"]["count"], json!(0));
        assert_eq!(v["list_students_and_marks"][3]["examPoints"], json!("-"));
        assert_eq!(
            v["popular_mistakes"],
            json!({ "Задание 4": "1 / 33.33%", "Задание 5": "1 / 33.33%" })
        );
        // D is absent (25%, allowed); B sits on 6 points (33.33%).
        assert_eq!(
            v["verification_results"],
            json!("результат недостоверный, так как на нижней границе 3-ки >= 25% учеников")
        );
    }

    #[test]
    fn controller_is_idempotent() {
        let roster = Roster::from_raw(&class()).expect("roster");
        let controller = MetricsController::new(default_metrics(Some(6)));
        assert_eq!(controller.run(&roster), controller.run(&roster));
    }

    #[test]
    fn empty_roster_produces_fallbacks() {
        let report = generate_report(Vec::new(), None, None).expect("report");
        let v = serde_json::to_value(&report).expect("json");
        assert_eq!(v["total_students"], json!(0));
        assert_eq!(v["average_mark_exam"], json!(0.0));
        assert_eq!(v["quality_exam"], json!(0.0));
        assert_eq!(v["popular_mistakes"], json!("отсутствуют"));
        assert_eq!(v["verification_results"], json!("результат достоверный"));
    }

    #[test]
    fn malformed_students_fail_the_report() {
        let e = generate_report(vec![json!(42)], None, None).expect_err("malformed");
        assert_eq!(e.code, "malformed_record");
    }
}
