use std::env;

use gradingd::rounding::RoundingRule;
use thiserror::Error;

/// Startup configuration for the sidecar, read once from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telemetry: TelemetryConfig,
    pub grading: GradingDefaults,
}

/// Fallbacks seeded into the `grading` and `alternative` settings sections.
#[derive(Debug, Clone)]
pub struct GradingDefaults {
    pub scale: String,
    pub rounding: RoundingRule,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GRADINGD_DEFAULT_ROUNDING is invalid: {0}")]
    InvalidRounding(String),
    #[error("GRADINGD_DEFAULT_SCALE must not be empty")]
    EmptyScale,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let log_level = env::var("GRADINGD_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let scale = env::var("GRADINGD_DEFAULT_SCALE")
            .unwrap_or_else(|_| gradingd::presets::STANDARD_SCALE.to_string())
            .trim()
            .to_string();
        if scale.is_empty() {
            return Err(ConfigError::EmptyScale);
        }

        let rounding = match env::var("GRADINGD_DEFAULT_ROUNDING") {
            Ok(raw) => raw
                .parse::<RoundingRule>()
                .map_err(|e| ConfigError::InvalidRounding(e.to_string()))?,
            Err(_) => RoundingRule::default(),
        };

        Ok(Self {
            telemetry: TelemetryConfig { log_level },
            grading: GradingDefaults { scale, rounding },
        })
    }
}
