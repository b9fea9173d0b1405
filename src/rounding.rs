use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{GradingError, GradingResult};

/// Largest supported precision; beyond this `10^d` scaling starts to lose the
/// integer part of realistic scores.
pub const MAX_DECIMAL_PLACES: u32 = 6;

/// Absorbs binary float noise in scaled units (`0.1 + 0.2` must round up to `0.3`).
const SCALED_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoundingMode {
    None,
    Up,
    Down,
    #[default]
    Nearest,
}

impl RoundingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Up => "up",
            Self::Down => "down",
            Self::Nearest => "nearest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "up" | "ceil" => Some(Self::Up),
            "down" | "floor" => Some(Self::Down),
            "nearest" | "round" => Some(Self::Nearest),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundingRule {
    #[serde(rename = "type")]
    pub mode: RoundingMode,
    #[serde(default)]
    pub decimal_places: u32,
}

impl Default for RoundingRule {
    fn default() -> Self {
        Self {
            mode: RoundingMode::Nearest,
            decimal_places: 0,
        }
    }
}

impl RoundingRule {
    pub fn new(mode: RoundingMode, decimal_places: u32) -> Self {
        Self {
            mode,
            decimal_places,
        }
    }

    pub fn none() -> Self {
        Self::new(RoundingMode::None, 0)
    }

    pub fn validate(&self) -> GradingResult<()> {
        if self.decimal_places > MAX_DECIMAL_PLACES {
            return Err(GradingError::configuration(format!(
                "rounding decimalPlaces must be <= {}",
                MAX_DECIMAL_PLACES
            )));
        }
        Ok(())
    }

    /// Smallest step the rule can produce (`10^-d`).
    pub fn unit(&self) -> f64 {
        1.0 / self.factor()
    }

    fn factor(&self) -> f64 {
        10_f64.powi(self.decimal_places.min(MAX_DECIMAL_PLACES) as i32)
    }

    pub fn apply(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return value;
        }
        let f = self.factor();
        match self.mode {
            RoundingMode::None => value,
            RoundingMode::Up => ((value * f) - SCALED_EPSILON).ceil() / f,
            RoundingMode::Down => ((value * f) + SCALED_EPSILON).floor() / f,
            RoundingMode::Nearest => ((value * f) + 0.5 + SCALED_EPSILON).floor() / f,
        }
    }
}

impl fmt::Display for RoundingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.mode.as_str(), self.decimal_places)
    }
}

impl FromStr for RoundingRule {
    type Err = GradingError;

    /// Parses `none`, `up:2`, `nearest:1` and similar.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (mode_raw, places_raw) = match s.split_once(':') {
            Some((m, p)) => (m, Some(p)),
            None => (s, None),
        };
        let mode = RoundingMode::parse(mode_raw).ok_or_else(|| {
            GradingError::configuration(format!("unknown rounding type: {}", mode_raw.trim()))
        })?;
        let decimal_places = match places_raw {
            None => 0,
            Some(p) => p.trim().parse::<u32>().map_err(|_| {
                GradingError::configuration(format!("bad rounding decimal places: {}", p.trim()))
            })?,
        };
        let rule = Self::new(mode, decimal_places);
        rule.validate()?;
        Ok(rule)
    }
}

/// Half-up rounding to a whole number: `Int(x + 0.5)`.
pub fn round_half_up(x: f64) -> f64 {
    (x + 0.5 + SCALED_EPSILON).floor()
}

/// One-decimal half-up rounding used for reported averages.
pub fn round_off_1_decimal(x: f64) -> f64 {
    RoundingRule::new(RoundingMode::Nearest, 1).apply(x)
}
