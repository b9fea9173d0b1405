//! Grading keys: grade boundaries over percentage space plus the rules that
//! turn a point total into one of those grades.
//!
//! A key is validated when it is built (or deserialized) and again before
//! every resolution. Boundaries are scanned from the highest `minPercentage`
//! downwards, so a value sitting on a shared edge belongs to the better grade.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{GradingError, GradingResult};
use crate::rounding::RoundingRule;

/// Largest step allowed between two adjacent boundaries (`89.99` → `90`).
pub const BOUNDARY_STEP_TOLERANCE: f64 = 0.01;

const EDGE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GradingKeyType {
    Percentage,
    Points,
    ErrorPoints,
}

impl fmt::Display for GradingKeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Percentage => "percentage",
            Self::Points => "points",
            Self::ErrorPoints => "errorPoints",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBoundary {
    pub grade: String,
    pub min_percentage: f64,
    pub max_percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_value: Option<String>,
}

impl GradeBoundary {
    pub fn new(grade: impl Into<String>, min_percentage: f64, max_percentage: f64) -> Self {
        Self {
            grade: grade.into(),
            min_percentage,
            max_percentage,
            display_value: None,
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display_value = Some(display.into());
        self
    }

    pub fn display(&self) -> &str {
        self.display_value.as_deref().unwrap_or(&self.grade)
    }
}

/// Outcome of resolving a point total against a key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeResolution {
    pub grade: String,
    pub display_value: String,
    /// Raw share of the key's total points, before rounding or inversion.
    pub percentage: f64,
    /// The value compared against the boundaries.
    pub effective_percentage: f64,
}

/// Unvalidated form used for deserialization.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGradingKey {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    key_type: GradingKeyType,
    total_points: f64,
    #[serde(default)]
    boundaries: Vec<GradeBoundary>,
    #[serde(default)]
    rounding: RoundingRule,
    #[serde(default)]
    error_points_to_grade: Option<bool>,
    #[serde(default = "default_true")]
    customizable: bool,
    #[serde(default)]
    modified_after_correction: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawGradingKey")]
pub struct GradingKey {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    key_type: GradingKeyType,
    total_points: f64,
    boundaries: Vec<GradeBoundary>,
    rounding: RoundingRule,
    error_points_to_grade: bool,
    customizable: bool,
    modified_after_correction: bool,
}

impl TryFrom<RawGradingKey> for GradingKey {
    type Error = GradingError;

    fn try_from(raw: RawGradingKey) -> Result<Self, Self::Error> {
        let mut key = GradingKey::new(
            raw.id,
            raw.name,
            raw.key_type,
            raw.total_points,
            raw.boundaries,
            raw.rounding,
        )?;
        if let Some(inverted) = raw.error_points_to_grade {
            key.error_points_to_grade = inverted;
        }
        key.customizable = raw.customizable;
        key.modified_after_correction = raw.modified_after_correction;
        Ok(key)
    }
}

impl GradingKey {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        key_type: GradingKeyType,
        total_points: f64,
        boundaries: Vec<GradeBoundary>,
        rounding: RoundingRule,
    ) -> GradingResult<Self> {
        let key = Self {
            id: id.into(),
            name: name.into(),
            key_type,
            total_points,
            boundaries: sorted_high_to_low(boundaries),
            rounding,
            error_points_to_grade: key_type == GradingKeyType::ErrorPoints,
            customizable: true,
            modified_after_correction: false,
        };
        key.validate()?;
        Ok(key)
    }

    pub fn with_error_points_to_grade(mut self, inverted: bool) -> Self {
        self.error_points_to_grade = inverted;
        self
    }

    pub fn with_customizable(mut self, customizable: bool) -> Self {
        self.customizable = customizable;
        self
    }

    pub fn key_type(&self) -> GradingKeyType {
        self.key_type
    }

    pub fn total_points(&self) -> f64 {
        self.total_points
    }

    /// Boundaries ordered best grade first.
    pub fn boundaries(&self) -> &[GradeBoundary] {
        &self.boundaries
    }

    pub fn rounding(&self) -> RoundingRule {
        self.rounding
    }

    pub fn error_points_to_grade(&self) -> bool {
        self.error_points_to_grade
    }

    pub fn customizable(&self) -> bool {
        self.customizable
    }

    pub fn modified_after_correction(&self) -> bool {
        self.modified_after_correction
    }

    fn is_inverted(&self) -> bool {
        self.key_type == GradingKeyType::ErrorPoints && self.error_points_to_grade
    }

    pub fn validate(&self) -> GradingResult<()> {
        if !self.total_points.is_finite() || self.total_points < 0.0 {
            return Err(GradingError::configuration(
                "totalPoints must be a finite, non-negative number",
            ));
        }
        self.rounding.validate()?;
        validate_boundaries(&self.boundaries)
    }

    fn ensure_unlocked(&self) -> GradingResult<()> {
        if self.modified_after_correction {
            return Err(GradingError::LockedConfiguration {
                key_id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Replaces the boundaries; rejected once the key graded a completed correction.
    pub fn set_boundaries(&mut self, boundaries: Vec<GradeBoundary>) -> GradingResult<()> {
        self.ensure_unlocked()?;
        let boundaries = sorted_high_to_low(boundaries);
        validate_boundaries(&boundaries)?;
        self.boundaries = boundaries;
        Ok(())
    }

    pub fn set_rounding(&mut self, rounding: RoundingRule) -> GradingResult<()> {
        self.ensure_unlocked()?;
        rounding.validate()?;
        self.rounding = rounding;
        Ok(())
    }

    pub fn set_total_points(&mut self, total_points: f64) -> GradingResult<()> {
        self.ensure_unlocked()?;
        if !total_points.is_finite() || total_points < 0.0 {
            return Err(GradingError::configuration(
                "totalPoints must be a finite, non-negative number",
            ));
        }
        self.total_points = total_points;
        Ok(())
    }

    /// Resolves a point total to a grade. Pure: never touches the lock flag.
    pub fn resolve_grade(&self, total_points: f64) -> GradingResult<GradeResolution> {
        self.validate()?;
        if self.boundaries.is_empty() {
            return Err(GradingError::configuration(format!(
                "grading key {} has no grade boundaries",
                self.id
            )));
        }
        if self.total_points == 0.0 {
            return Err(GradingError::Division(format!(
                "grading key {} has totalPoints = 0",
                self.id
            )));
        }

        let percentage = total_points / self.total_points * 100.0;
        let effective = self.effective_percentage(total_points);
        let boundary = &self.boundaries[self.boundary_index(effective)];
        Ok(GradeResolution {
            grade: boundary.grade.clone(),
            display_value: boundary.display().to_string(),
            percentage,
            effective_percentage: effective,
        })
    }

    /// Resolution performed when a correction is committed; locks the key.
    /// Setting the flag again is a no-op.
    pub fn resolve_for_correction(&mut self, total_points: f64) -> GradingResult<GradeResolution> {
        let resolution = self.resolve_grade(total_points)?;
        self.modified_after_correction = true;
        Ok(resolution)
    }

    /// Resolves an already computed percentage (part sub-scores, criteria).
    /// Rounding applies to the percentage; no inversion takes place.
    pub fn resolve_percentage(&self, percentage: f64) -> GradingResult<GradeResolution> {
        self.validate()?;
        if self.boundaries.is_empty() {
            return Err(GradingError::configuration(format!(
                "grading key {} has no grade boundaries",
                self.id
            )));
        }
        let effective = self.rounding.apply(percentage).max(0.0);
        let boundary = &self.boundaries[self.boundary_index(effective)];
        Ok(GradeResolution {
            grade: boundary.grade.clone(),
            display_value: boundary.display().to_string(),
            percentage,
            effective_percentage: effective,
        })
    }

    /// Minimum extra points to reach the next better grade, at two-decimal
    /// granularity. For inverted error-point keys this is the number of error
    /// points that must be removed instead.
    pub fn points_to_next_grade(&self, total_points: f64) -> GradingResult<Option<f64>> {
        if self.boundaries.is_empty() {
            return Ok(None);
        }
        self.validate()?;
        if self.total_points == 0.0 {
            return Err(GradingError::Division(format!(
                "grading key {} has totalPoints = 0",
                self.id
            )));
        }

        let current = self.boundary_index(self.effective_percentage(total_points));
        if current == 0 {
            return Ok(None);
        }
        let target = current - 1;
        let target_min = self.boundaries[target].min_percentage;

        let threshold_points = if self.is_inverted() {
            // effective = 100 - error%  >=  target_min  <=>  error% <= 100 - target_min
            (100.0 - target_min) / 100.0 * self.total_points
        } else {
            target_min / 100.0 * self.total_points
        };
        let raw_delta = if self.is_inverted() {
            total_points - threshold_points
        } else {
            threshold_points - total_points
        };

        let mut delta = ceil_hundredths(raw_delta.max(0.0));
        // Rounding may let a smaller delta through; walk down while it still reaches.
        while delta >= 0.01 && self.reaches(total_points, delta - 0.01, target) {
            delta = ceil_hundredths(delta - 0.01);
        }
        // Strict edges (rounding up lands just short) need one more step.
        let mut guard = 0;
        while !self.reaches(total_points, delta, target) && guard < 100 {
            delta = ceil_hundredths(delta + 0.01);
            guard += 1;
        }
        Ok(Some(delta))
    }

    fn reaches(&self, total_points: f64, delta: f64, target: usize) -> bool {
        let moved = if self.is_inverted() {
            total_points - delta
        } else {
            total_points + delta
        };
        self.boundary_index(self.effective_percentage(moved)) <= target
    }

    fn effective_percentage(&self, total_points: f64) -> f64 {
        let percentage = match self.key_type {
            GradingKeyType::Points => self.rounding.apply(total_points) / self.total_points * 100.0,
            GradingKeyType::Percentage | GradingKeyType::ErrorPoints => {
                self.rounding.apply(total_points / self.total_points * 100.0)
            }
        };
        if self.is_inverted() {
            (100.0 - percentage).max(0.0)
        } else {
            percentage.max(0.0)
        }
    }

    /// Index of the first boundary (best first) whose minimum is reached.
    fn boundary_index(&self, effective: f64) -> usize {
        self.boundaries
            .iter()
            .position(|b| effective + EDGE_EPSILON >= b.min_percentage)
            .unwrap_or(self.boundaries.len() - 1)
    }
}

fn sorted_high_to_low(mut boundaries: Vec<GradeBoundary>) -> Vec<GradeBoundary> {
    boundaries.sort_by(|a, b| {
        b.min_percentage
            .partial_cmp(&a.min_percentage)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    boundaries
}

fn ceil_hundredths(x: f64) -> f64 {
    ((x * 100.0) - EDGE_EPSILON).ceil().max(0.0) / 100.0
}

/// Checks that boundaries (best first) tile `[0, 100]` without gaps or overlaps.
pub fn validate_boundaries(boundaries: &[GradeBoundary]) -> GradingResult<()> {
    if boundaries.is_empty() {
        return Ok(());
    }

    let mut labels = HashSet::new();
    for b in boundaries {
        if b.grade.trim().is_empty() {
            return Err(GradingError::configuration("grade label must not be empty"));
        }
        if !labels.insert(b.grade.as_str()) {
            return Err(GradingError::configuration(format!(
                "duplicate grade label: {}",
                b.grade
            )));
        }
        if !b.min_percentage.is_finite() || !b.max_percentage.is_finite() {
            return Err(GradingError::configuration(format!(
                "boundary {} has a non-finite percentage",
                b.grade
            )));
        }
        if b.min_percentage < 0.0 || b.max_percentage > 100.0 {
            return Err(GradingError::configuration(format!(
                "boundary {} lies outside 0..=100",
                b.grade
            )));
        }
        if b.min_percentage > b.max_percentage {
            return Err(GradingError::configuration(format!(
                "boundary {} has min > max",
                b.grade
            )));
        }
    }

    let top = &boundaries[0];
    if (top.max_percentage - 100.0).abs() > EDGE_EPSILON {
        return Err(GradingError::configuration(format!(
            "boundaries must reach 100%, top boundary {} ends at {}",
            top.grade, top.max_percentage
        )));
    }
    let bottom = &boundaries[boundaries.len() - 1];
    if bottom.min_percentage.abs() > EDGE_EPSILON {
        return Err(GradingError::configuration(format!(
            "boundaries must start at 0%, bottom boundary {} starts at {}",
            bottom.grade, bottom.min_percentage
        )));
    }

    for pair in boundaries.windows(2) {
        let (higher, lower) = (&pair[0], &pair[1]);
        let step = higher.min_percentage - lower.max_percentage;
        if step < -EDGE_EPSILON {
            return Err(GradingError::configuration(format!(
                "boundaries {} and {} overlap",
                higher.grade, lower.grade
            )));
        }
        if step > BOUNDARY_STEP_TOLERANCE + EDGE_EPSILON {
            return Err(GradingError::configuration(format!(
                "gap between boundaries {} and {} ({} .. {})",
                lower.grade, higher.grade, lower.max_percentage, higher.min_percentage
            )));
        }
    }
    Ok(())
}
