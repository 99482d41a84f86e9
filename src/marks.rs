use crate::calc::CalcError;
use crate::roster::{as_record, raw_exam_points, raw_is_present, FIELD_EXAM_MARK};
use serde::Deserialize;
use serde_json::{json, Value};

pub const BASE_MARK: i64 = 2;

/// Minimum points for marks 3, 4 and 5 as entered on the setup form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandThresholds {
    pub points_for_3: Option<i64>,
    pub points_for_4: Option<i64>,
    pub points_for_5: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandEntry {
    pub mark: i64,
    pub min_points: Option<i64>,
}

/// Ascending point thresholds mapping exam points to a mark from 2 to 5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkBand {
    entries: [BandEntry; 3],
}

impl MarkBand {
    pub fn new(t: BandThresholds) -> Result<Self, CalcError> {
        let entries = [
            BandEntry { mark: 3, min_points: t.points_for_3 },
            BandEntry { mark: 4, min_points: t.points_for_4 },
            BandEntry { mark: 5, min_points: t.points_for_5 },
        ];

        for e in &entries {
            if let Some(p) = e.min_points {
                if p < 0 {
                    return Err(CalcError::new(
                        "invalid_mark_band",
                        format!("points for {} must not be negative", e.mark),
                    )
                    .with_details(json!({ "mark": e.mark, "points": p })));
                }
            }
        }
        for pair in entries.windows(2) {
            if let (Some(lo), Some(hi)) = (pair[0].min_points, pair[1].min_points) {
                if lo >= hi {
                    return Err(CalcError::new(
                        "invalid_mark_band",
                        format!(
                            "points for {} must be higher than points for {}",
                            pair[1].mark, pair[0].mark
                        ),
                    )
                    .with_details(json!({ "lower": lo, "higher": hi })));
                }
            }
        }

        Ok(Self { entries })
    }

    pub fn min_points_for(&self, mark: i64) -> Option<i64> {
        self.entries
            .iter()
            .find(|e| e.mark == mark)
            .and_then(|e| e.min_points)
    }

    /// Walks the band upward from the base mark; an unset threshold ends the
    /// walk like an unmet one.
    pub fn mark_for(&self, exam_points: i64) -> i64 {
        let mut mark = BASE_MARK;
        for e in &self.entries {
            match e.min_points {
                Some(min) if exam_points >= min => mark += 1,
                _ => break,
            }
        }
        mark
    }
}

/// Sets `exam_mark` on every present record. Absent records are returned
/// untouched.
pub fn assign_exam_marks(students: Vec<Value>, band: &MarkBand) -> Result<Vec<Value>, CalcError> {
    let mut out = Vec::with_capacity(students.len());
    for (i, mut student) in students.into_iter().enumerate() {
        let rec = as_record(&student, i)?;
        if raw_is_present(rec) {
            let points = raw_exam_points(rec);
            let mark = band.mark_for(points);
            if let Some(obj) = student.as_object_mut() {
                obj.insert(FIELD_EXAM_MARK.to_string(), json!(mark));
            }
        }
        out.push(student);
    }
    Ok(out)
}
