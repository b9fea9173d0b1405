use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{GradingError, GradingResult};
use crate::grading_key::{GradeResolution, GradingKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub weight: f64,
    pub min_value: f64,
    pub max_value: f64,
}

impl CriterionConfig {
    pub fn new(id: impl Into<String>, weight: f64, min_value: f64, max_value: f64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            weight,
            min_value,
            max_value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionScore {
    pub criterion_id: String,
    pub value: f64,
    pub fraction: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaResult {
    /// Weighted overall fraction in `0..=1`.
    pub score: f64,
    pub percentage: f64,
    pub breakdown: Vec<CriterionScore>,
}

impl CriteriaResult {
    pub fn grade(&self, key: &GradingKey) -> GradingResult<GradeResolution> {
        key.resolve_percentage(self.percentage)
    }
}

/// Clamps each value into its criterion's range, normalizes it to `0..=1`
/// and returns the weight-averaged fraction.
pub fn aggregate(
    criteria: &[CriterionConfig],
    values: &HashMap<String, f64>,
) -> GradingResult<CriteriaResult> {
    let mut total_weight = 0.0_f64;
    for c in criteria {
        if !c.weight.is_finite() || c.weight < 0.0 {
            return Err(GradingError::configuration(format!(
                "criterion {}: weight must be a non-negative number",
                c.id
            )));
        }
        if !c.min_value.is_finite() || !c.max_value.is_finite() || c.min_value >= c.max_value {
            return Err(GradingError::configuration(format!(
                "criterion {}: minValue must be below maxValue",
                c.id
            )));
        }
        total_weight += c.weight;
    }
    if total_weight == 0.0 {
        return Err(GradingError::configuration("sum of criterion weights is 0"));
    }

    let mut weighted = 0.0_f64;
    let mut breakdown = Vec::with_capacity(criteria.len());
    for c in criteria {
        let raw = values
            .get(&c.id)
            .copied()
            .ok_or_else(|| GradingError::MissingValue(c.id.clone()))?;
        let value = raw.clamp(c.min_value, c.max_value);
        let fraction = (value - c.min_value) / (c.max_value - c.min_value);
        weighted += fraction * c.weight;
        breakdown.push(CriterionScore {
            criterion_id: c.id.clone(),
            value,
            fraction,
            weight: c.weight,
        });
    }

    let score = weighted / total_weight;
    Ok(CriteriaResult {
        score,
        percentage: score * 100.0,
        breakdown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn weighted_fraction_with_clamping() {
        let criteria = vec![
            CriterionConfig::new("technique", 2.0, 0.0, 10.0),
            CriterionConfig::new("effort", 1.0, 1.0, 5.0),
        ];
        // technique 12 clamps to 10 -> 1.0; effort 3 -> 0.5
        let r = aggregate(&criteria, &values(&[("technique", 12.0), ("effort", 3.0)])).unwrap();
        assert!((r.score - (2.0 * 1.0 + 0.5) / 3.0).abs() < 1e-12);
        assert_eq!(r.breakdown[0].value, 10.0);
    }

    #[test]
    fn missing_value_is_reported() {
        let criteria = vec![CriterionConfig::new("a", 1.0, 0.0, 1.0)];
        assert_eq!(
            aggregate(&criteria, &HashMap::new()),
            Err(GradingError::MissingValue("a".into()))
        );
    }

    #[test]
    fn zero_weight_sum_is_a_configuration_error() {
        let criteria = vec![CriterionConfig::new("a", 0.0, 0.0, 1.0)];
        assert!(matches!(
            aggregate(&criteria, &values(&[("a", 1.0)])),
            Err(GradingError::Configuration(_))
        ));
        assert!(matches!(
            aggregate(&[], &HashMap::new()),
            Err(GradingError::Configuration(_))
        ));
    }
}
