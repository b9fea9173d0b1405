use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{GradingError, GradingResult};
use crate::rounding::round_half_up;

/// Distances closer than this count as a tie.
const TIE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleEntry {
    pub symbol: String,
    pub multiplier: f64,
}

impl ScaleEntry {
    pub fn new(symbol: impl Into<String>, multiplier: f64) -> Self {
        Self {
            symbol: symbol.into(),
            multiplier,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScale {
    name: String,
    entries: Vec<ScaleEntry>,
}

/// A qualitative scale, best symbol first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawScale")]
pub struct AlternativeScale {
    pub name: String,
    entries: Vec<ScaleEntry>,
}

impl TryFrom<RawScale> for AlternativeScale {
    type Error = GradingError;

    fn try_from(raw: RawScale) -> Result<Self, Self::Error> {
        AlternativeScale::new(raw.name, raw.entries)
    }
}

impl AlternativeScale {
    pub fn new(name: impl Into<String>, entries: Vec<ScaleEntry>) -> GradingResult<Self> {
        let name = name.into();
        if entries.len() != 3 && entries.len() != 5 {
            return Err(GradingError::configuration(format!(
                "scale {} must have 3 or 5 symbols, got {}",
                name,
                entries.len()
            )));
        }
        let mut seen = HashSet::new();
        for e in &entries {
            if e.symbol.trim().is_empty() {
                return Err(GradingError::configuration(format!(
                    "scale {} has an empty symbol",
                    name
                )));
            }
            if !seen.insert(e.symbol.as_str()) {
                return Err(GradingError::configuration(format!(
                    "scale {} repeats symbol {}",
                    name, e.symbol
                )));
            }
            if !(0.0..=1.0).contains(&e.multiplier) {
                return Err(GradingError::configuration(format!(
                    "scale {} symbol {}: multiplier must be within 0..=1",
                    name, e.symbol
                )));
            }
        }
        if entries
            .windows(2)
            .any(|pair| pair[1].multiplier >= pair[0].multiplier)
        {
            return Err(GradingError::configuration(format!(
                "scale {} must be declared best first with strictly falling multipliers",
                name
            )));
        }
        Ok(Self { name, entries })
    }

    pub fn entries(&self) -> &[ScaleEntry] {
        &self.entries
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.symbol.as_str())
    }

    pub fn multiplier(&self, symbol: &str) -> GradingResult<f64> {
        self.entries
            .iter()
            .find(|e| e.symbol == symbol.trim())
            .map(|e| e.multiplier)
            .ok_or_else(|| GradingError::UnknownSymbol {
                symbol: symbol.to_string(),
                scale: self.name.clone(),
            })
    }

    pub fn worst(&self) -> &ScaleEntry {
        // Construction guarantees at least three entries.
        &self.entries[self.entries.len() - 1]
    }
}

/// Points for a symbol: `maxPoints * multiplier`, rounded half-up.
pub fn to_points(symbol: &str, max_points: f64, scale: &AlternativeScale) -> GradingResult<f64> {
    let multiplier = scale.multiplier(symbol)?;
    Ok(round_half_up(max_points * multiplier))
}

/// Symbol whose multiplier is closest to `points / maxPoints`.
///
/// `maxPoints == 0` yields the worst symbol: nothing was achievable. Exact
/// ties go to the earlier (better) symbol.
pub fn to_symbol<'s>(points: f64, max_points: f64, scale: &'s AlternativeScale) -> &'s str {
    if max_points == 0.0 {
        return &scale.worst().symbol;
    }
    let fraction = points / max_points;

    let mut best = &scale.entries[0];
    let mut best_distance = (best.multiplier - fraction).abs();
    for entry in &scale.entries[1..] {
        let distance = (entry.multiplier - fraction).abs();
        if distance < best_distance - TIE_EPSILON {
            best = entry;
            best_distance = distance;
        }
    }
    &best.symbol
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedSymbol {
    pub symbol: String,
    pub weight: f64,
}

impl WeightedSymbol {
    pub fn new(symbol: impl Into<String>, weight: f64) -> Self {
        Self {
            symbol: symbol.into(),
            weight,
        }
    }
}

/// `Σ(multiplier · weight) / Σ(weight)`; 0 for no entries or zero total weight.
pub fn weighted_average(entries: &[WeightedSymbol], scale: &AlternativeScale) -> GradingResult<f64> {
    let mut sum = 0.0_f64;
    let mut denom = 0.0_f64;
    for e in entries {
        if !e.weight.is_finite() || e.weight < 0.0 {
            return Err(GradingError::configuration(format!(
                "weight for symbol {} must be a non-negative number",
                e.symbol
            )));
        }
        sum += scale.multiplier(&e.symbol)? * e.weight;
        denom += e.weight;
    }
    if denom > 0.0 {
        Ok(sum / denom)
    } else {
        Ok(0.0)
    }
}
