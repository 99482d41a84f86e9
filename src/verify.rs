use crate::calc::{percentage, MarkField};
use crate::roster::Roster;
use serde::{Serialize, Serializer};
use std::fmt;

pub const CRITICAL_ABSENT_PERCENTAGE: f64 = 25.0;
pub const CRITICAL_AVERAGE_DIFF: f64 = 0.5;
pub const CRITICAL_BOUNDARY_PERCENTAGE: f64 = 25.0;

pub const RELIABLE: &str = "результат достоверный";
pub const UNRELIABLE: &str = "результат недостоверный";
const REASON_PREFIX: &str = ", так как ";
const REASON_SEPARATOR: &str = "; ";

/// Data-quality checks that can mark a whole report as unreliable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// More than a quarter of the roster missed the exam.
    Attendance,
    /// Class averages of the exam and the third quarter differ by half a mark
    /// or more.
    MarkDrift,
    /// Too many students sit exactly on the given point threshold.
    ThresholdBoundary { mark_threshold: Option<i64> },
}

impl Verification {
    /// A zero threshold disables the check.
    pub fn threshold_boundary(mark_threshold: Option<i64>) -> Self {
        Verification::ThresholdBoundary {
            mark_threshold: mark_threshold.filter(|t| *t != 0),
        }
    }

    pub fn failure_message(&self) -> &'static str {
        match self {
            Verification::Attendance => "кол-во неявившихся учеников > 25%",
            Verification::MarkDrift => "отличие средних баллов и предыдущей четверти >= 0.5 баллов",
            Verification::ThresholdBoundary { .. } => "на нижней границе 3-ки >= 25% учеников",
        }
    }

    pub fn passes(&self, roster: &Roster) -> bool {
        match self {
            Verification::Attendance => {
                let absent = percentage(roster.absent_count(), roster.all().len());
                absent <= CRITICAL_ABSENT_PERCENTAGE
            }
            Verification::MarkDrift => {
                let exam = raw_average(roster, MarkField::Exam);
                let quarter = raw_average(roster, MarkField::ThirdQuarter);
                (exam - quarter).abs() < CRITICAL_AVERAGE_DIFF
            }
            Verification::ThresholdBoundary { mark_threshold } => {
                let Some(threshold) = *mark_threshold else {
                    return true;
                };
                let on_boundary = roster
                    .iter()
                    .filter(|s| s.exam_points() == threshold)
                    .count();
                percentage(on_boundary, roster.present_count()) < CRITICAL_BOUNDARY_PERCENTAGE
            }
        }
    }
}

fn raw_average(roster: &Roster, field: MarkField) -> f64 {
    let n = roster.present_count();
    if n == 0 {
        return 0.0;
    }
    let sum: i64 = roster.iter().map(|s| field.of(s).points()).sum();
    sum as f64 / n as f64
}

/// Outcome of running every configured verification. Serializes as the
/// display sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub failures: Vec<&'static str>,
}

impl Verdict {
    pub fn run(checks: &[Verification], roster: &Roster) -> Self {
        let failures = checks
            .iter()
            .filter(|v| !v.passes(roster))
            .map(Verification::failure_message)
            .collect();
        Self { failures }
    }

    pub fn is_reliable(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_reliable() {
            return f.write_str(RELIABLE);
        }
        write!(
            f,
            "{UNRELIABLE}{REASON_PREFIX}{}",
            self.failures.join(REASON_SEPARATOR)
        )
    }
}

impl Serialize for Verdict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
