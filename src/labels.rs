use crate::report::Report;
use serde_json::{Map, Value};

/// Display labels for report keys. Keys without an entry are shown as-is.
pub const LABELS: &[(&str, &str)] = &[
    ("total_students", "Учащихся по списку"),
    ("students_present_exam", "Учащиеся, присутствующие на экзамене"),
    ("students_absent_exam", "Отсутствующие учащиеся"),
    ("list_students_and_marks", "Список учеников с оценками"),
    ("marks_3rd_quarter", "Оценки за 3-ю четверть"),
    ("marks_exam", "Оценки за ВПР"),
    ("quality_third_quarter", "Процент качества, 3я четверть"),
    ("quality_exam", "Процент качества, экзамен"),
    ("success_third_quarter", "Процент успеваемости, 3-я четверть"),
    ("success_exam", "Процент успеваемости, экзамен"),
    ("average_mark_third_quarter", "Средний балл по предмету"),
    ("average_mark_exam", "Средний балл за ВПР"),
    ("average_solved_exam_tasks", "Среднее количество решенных задач"),
    ("improve_mark", "Процент учащихся, повысивших свой результат"),
    ("reduce_mark", "Процент учащихся, понизивших свой результат"),
    ("verification_results", "Проверка достоверности результатов"),
    ("popular_mistakes", "Самые распространенные ошибки"),
];

pub fn label_for(key: &str) -> &str {
    LABELS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, label)| *label)
        .unwrap_or(key)
}

/// Re-keys a serialized report by display label, keeping metric order.
pub fn translate(report: &Report) -> Result<Map<String, Value>, serde_json::Error> {
    let mut out = Map::new();
    for r in report.results() {
        out.insert(label_for(r.name).to_string(), serde_json::to_value(&r.value)?);
    }
    Ok(out)
}
