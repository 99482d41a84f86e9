use crate::calc::{MarkField, Metric, MetricValue, PopularMistakes, RateKind, StudentMarks};
use crate::labels::label_for;
use crate::report::Report;
use crate::roster::UNSET;
use serde::Serialize;
use serde_json::{json, Value};

pub const CHART_MARKS: [i64; 4] = [2, 3, 4, 5];
pub const TABLE_MARKS: [i64; 4] = [5, 4, 3, 2];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub quarter_grades: Vec<usize>,
    pub exam_grades: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarksRow {
    pub name: String,
    pub quarter: Value,
    pub exam: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledValue {
    pub label: String,
    pub value: String,
}

/// Report regrouped the way the results page lays it out: a mark chart, a
/// quarter-vs-exam table, the student list, mistakes, and everything else.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    pub chart_data: ChartData,
    pub table_marks: Vec<MarksRow>,
    pub table_students: Vec<StudentMarks>,
    pub popular_mistakes: PopularMistakes,
    pub other_data: Vec<LabeledValue>,
}

fn histogram_count(v: Option<&MetricValue>, mark: i64) -> Option<usize> {
    match v {
        Some(MetricValue::Histogram(h)) => h.get(&mark).copied(),
        _ => None,
    }
}

fn count_cell(v: Option<&MetricValue>, mark: i64) -> Value {
    histogram_count(v, mark).map_or_else(|| json!(UNSET), |n| json!(n))
}

fn rate_cell(v: Option<&MetricValue>) -> Value {
    match v {
        Some(MetricValue::Number(x)) => json!(x),
        _ => json!(UNSET),
    }
}

impl ReportView {
    pub fn from_report(report: &Report) -> Self {
        use MarkField::{Exam, ThirdQuarter};

        let quarter_counts = Metric::MarkCounts(ThirdQuarter).name();
        let exam_counts = Metric::MarkCounts(Exam).name();
        let rate_names = [
            (RateKind::Quality, "Процент качества"),
            (RateKind::Success, "Процент успеваемости"),
        ];
        let students_name = Metric::StudentList.name();
        let mistakes_name = Metric::PopularMistakes.name();

        let chart_data = ChartData {
            quarter_grades: CHART_MARKS
                .iter()
                .map(|m| histogram_count(report.get(quarter_counts), *m).unwrap_or(0))
                .collect(),
            exam_grades: CHART_MARKS
                .iter()
                .map(|m| histogram_count(report.get(exam_counts), *m).unwrap_or(0))
                .collect(),
        };

        let mut table_marks: Vec<MarksRow> = TABLE_MARKS
            .iter()
            .map(|m| MarksRow {
                name: format!("Кол-во «{m}»"),
                quarter: count_cell(report.get(quarter_counts), *m),
                exam: count_cell(report.get(exam_counts), *m),
            })
            .collect();
        for (kind, title) in rate_names {
            table_marks.push(MarksRow {
                name: title.to_string(),
                quarter: rate_cell(report.get(Metric::Rate(kind, ThirdQuarter).name())),
                exam: rate_cell(report.get(Metric::Rate(kind, Exam).name())),
            });
        }

        let table_students = match report.get(students_name) {
            Some(MetricValue::Students(s)) => s.clone(),
            _ => Vec::new(),
        };
        let popular_mistakes = match report.get(mistakes_name) {
            Some(MetricValue::Mistakes(m)) => m.clone(),
            _ => PopularMistakes::None,
        };

        let mut consumed = vec![quarter_counts, exam_counts, students_name, mistakes_name];
        for (kind, _) in rate_names {
            consumed.push(Metric::Rate(kind, ThirdQuarter).name());
            consumed.push(Metric::Rate(kind, Exam).name());
        }
        let other_data = report
            .results()
            .iter()
            .filter(|r| !consumed.contains(&r.name))
            .map(|r| LabeledValue {
                label: label_for(r.name).to_string(),
                value: r.value.display(),
            })
            .collect();

        Self {
            chart_data,
            table_marks,
            table_students,
            popular_mistakes,
            other_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{default_metrics, MetricsController};
    use crate::roster::Roster;

    fn view(rows: Vec<Value>) -> ReportView {
        let roster = Roster::from_raw(&rows).expect("roster");
        ReportView::from_report(&MetricsController::new(default_metrics(None)).run(&roster))
    }

    #[test]
    fn chart_and_table() {
        let v = view(vec![
            json!({ "student_name": "A", "is_present": true, "third_quarter": 4, "exam_mark": 5 }),
            json!({ "student_name": "B", "is_present": true, "third_quarter": 4, "exam_mark": 3 }),
            json!({ "student_name": "C", "is_present": false }),
        ]);
        assert_eq!(v.chart_data.quarter_grades, vec![0, 0, 2, 0]);
        assert_eq!(v.chart_data.exam_grades, vec![0, 1, 0, 1]);

        assert_eq!(v.table_marks.len(), 6);
        assert_eq!(v.table_marks[0].name, "Кол-во «5»");
        assert_eq!(v.table_marks[0].quarter, json!("-"));
        assert_eq!(v.table_marks[0].exam, json!(1));
        assert_eq!(v.table_marks[1].quarter, json!(2));
        assert_eq!(v.table_marks[4].name, "Процент качества");
        assert_eq!(v.table_marks[4].quarter, json!(100.0));
        assert_eq!(v.table_marks[4].exam, json!(50.0));
        assert_eq!(v.table_marks[5].exam, json!(100.0));

        assert_eq!(v.table_students.len(), 3);
    }

    #[test]
    fn other_data_is_labeled_text() {
        let v = view(vec![
            json!({ "is_present": true, "third_quarter": 4, "exam_mark": 5 }),
            json!({ "is_present": false }),
        ]);
        let labels: Vec<_> = v.other_data.iter().map(|o| o.label.as_str()).collect();
        assert!(labels.contains(&"Учащихся по списку"));
        assert!(!labels.contains(&"Оценки за ВПР"));
        let improve = v
            .other_data
            .iter()
            .find(|o| o.label == "Процент учащихся, повысивших свой результат")
            .expect("improve row");
        assert_eq!(improve.value, "100% (1 чел.)");
        assert_eq!(v.popular_mistakes, PopularMistakes::None);
    }
}
