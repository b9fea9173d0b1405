use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::correction::{CorrectionEntry, CorrectionStatus};
use crate::rounding::round_off_1_decimal;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionSummary {
    pub completed_count: usize,
    pub pending_count: usize,
    pub average_points: f64,
    pub average_percentage: f64,
    pub median_percentage: f64,
    pub grade_distribution: BTreeMap<String, usize>,
}

fn compute_median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[(n / 2) - 1] + sorted[n / 2]) / 2.0
    }
}

/// Class-level figures over completed corrections; anything still open only
/// shows up in `pending_count`.
pub fn summarize<'a, I>(entries: I) -> CorrectionSummary
where
    I: IntoIterator<Item = &'a CorrectionEntry>,
{
    let mut pending_count = 0_usize;
    let mut points: Vec<f64> = Vec::new();
    let mut percentages: Vec<f64> = Vec::new();
    let mut grade_distribution: BTreeMap<String, usize> = BTreeMap::new();

    for e in entries {
        if e.status != CorrectionStatus::Completed {
            pending_count += 1;
            continue;
        }
        points.push(e.total_points);
        percentages.push(e.percentage_score);
        *grade_distribution.entry(e.total_grade.clone()).or_insert(0) += 1;
    }

    let n = points.len();
    let (average_points, average_percentage) = if n > 0 {
        (
            points.iter().sum::<f64>() / n as f64,
            percentages.iter().sum::<f64>() / n as f64,
        )
    } else {
        (0.0, 0.0)
    };

    CorrectionSummary {
        completed_count: n,
        pending_count,
        average_points: round_off_1_decimal(average_points),
        average_percentage: round_off_1_decimal(average_percentage),
        median_percentage: round_off_1_decimal(compute_median(&percentages)),
        grade_distribution,
    }
}
