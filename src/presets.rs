//! Built-in scales and grading keys offered when a new exam is set up.

use crate::alternative::{AlternativeScale, ScaleEntry};
use crate::error::GradingResult;
use crate::grading_key::{GradeBoundary, GradingKey, GradingKeyType};
use crate::rounding::RoundingRule;

pub const STANDARD_SCALE: &str = "standard";
pub const SIMPLIFIED_SCALE: &str = "simplified";

/// `++ / + / 0 / - / --`.
pub fn standard_scale() -> AlternativeScale {
    build_scale(
        STANDARD_SCALE,
        &[("++", 1.0), ("+", 0.85), ("0", 0.65), ("-", 0.40), ("--", 0.15)],
    )
}

/// `+ / 0 / -`.
pub fn simplified_scale() -> AlternativeScale {
    build_scale(SIMPLIFIED_SCALE, &[("+", 1.0), ("0", 0.6), ("-", 0.2)])
}

pub fn default_scales() -> Vec<AlternativeScale> {
    vec![standard_scale(), simplified_scale()]
}

fn build_scale(name: &str, entries: &[(&str, f64)]) -> AlternativeScale {
    let entries = entries
        .iter()
        .map(|(symbol, multiplier)| ScaleEntry::new(*symbol, *multiplier))
        .collect();
    match AlternativeScale::new(name, entries) {
        Ok(scale) => scale,
        Err(e) => unreachable!("built-in scale {} is invalid: {}", name, e),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPreset {
    /// Grades 1 (best) to 6.
    SixGrade,
    /// Upper-school points 15 (best) to 0.
    FifteenPoint,
}

impl KeyPreset {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sixgrade" | "six_grade" | "six-grade" => Some(Self::SixGrade),
            "fifteenpoint" | "fifteen_point" | "fifteen-point" => Some(Self::FifteenPoint),
            _ => None,
        }
    }

    fn boundaries(self) -> Vec<GradeBoundary> {
        match self {
            Self::SixGrade => contiguous(&[
                ("1", 92.0, "very good"),
                ("2", 81.0, "good"),
                ("3", 67.0, "satisfactory"),
                ("4", 50.0, "sufficient"),
                ("5", 30.0, "poor"),
                ("6", 0.0, "insufficient"),
            ]),
            Self::FifteenPoint => contiguous(&[
                ("15", 95.0, "15"),
                ("14", 90.0, "14"),
                ("13", 85.0, "13"),
                ("12", 80.0, "12"),
                ("11", 75.0, "11"),
                ("10", 70.0, "10"),
                ("9", 65.0, "9"),
                ("8", 60.0, "8"),
                ("7", 55.0, "7"),
                ("6", 50.0, "6"),
                ("5", 45.0, "5"),
                ("4", 40.0, "4"),
                ("3", 33.0, "3"),
                ("2", 27.0, "2"),
                ("1", 20.0, "1"),
                ("0", 0.0, "0"),
            ]),
        }
    }

    pub fn build(
        self,
        id: impl Into<String>,
        total_points: f64,
        rounding: RoundingRule,
    ) -> GradingResult<GradingKey> {
        let name = match self {
            Self::SixGrade => "Grades 1-6",
            Self::FifteenPoint => "Points 15-0",
        };
        GradingKey::new(
            id,
            name,
            GradingKeyType::Percentage,
            total_points,
            self.boundaries(),
            rounding,
        )
    }
}

/// Boundaries from `(grade, min, label)` rows, best first; each row ends
/// 0.01 below the previous row's minimum.
fn contiguous(rows: &[(&str, f64, &str)]) -> Vec<GradeBoundary> {
    let mut upper = 100.0;
    let mut out = Vec::with_capacity(rows.len());
    for (grade, min, label) in rows {
        out.push(GradeBoundary::new(*grade, *min, upper).with_display(*label));
        upper = ((*min - 0.01) * 100.0).round() / 100.0;
    }
    out
}
