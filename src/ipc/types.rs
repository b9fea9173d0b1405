use std::collections::HashMap;

use gradingd::presets;
use gradingd::{AlternativeScale, CorrectionEntry, GradingKey, LookupTable, Part, TaskTree};
use serde::Deserialize;

use crate::config::GradingDefaults;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// An exam's task structure plus its reporting parts.
#[derive(Debug, Clone)]
pub struct Exam {
    pub tree: TaskTree,
    pub parts: Vec<Part>,
}

/// In-memory registries. The sidecar owns no storage; its caller persists
/// whatever it reads back through the `*.get` methods.
pub struct AppState {
    pub defaults: GradingDefaults,
    pub settings: HashMap<String, serde_json::Value>,
    pub keys: HashMap<String, GradingKey>,
    pub tables: HashMap<String, LookupTable>,
    pub scales: HashMap<String, AlternativeScale>,
    pub exams: HashMap<String, Exam>,
    pub corrections: HashMap<String, CorrectionEntry>,
}

impl AppState {
    pub fn new(defaults: GradingDefaults) -> Self {
        let scales = presets::default_scales()
            .into_iter()
            .map(|s| (s.name.clone(), s))
            .collect();
        Self {
            defaults,
            settings: HashMap::new(),
            keys: HashMap::new(),
            tables: HashMap::new(),
            scales,
            exams: HashMap::new(),
            corrections: HashMap::new(),
        }
    }

    pub fn settings_get_json(&self, key: &str) -> Option<&serde_json::Value> {
        self.settings.get(key)
    }

    pub fn settings_set_json(&mut self, key: &str, value: serde_json::Value) {
        self.settings.insert(key.to_string(), value);
    }

    /// A task tree is frozen once any correction points at its exam.
    pub fn exam_has_corrections(&self, exam_id: &str) -> bool {
        self.corrections.values().any(|c| c.exam_id == exam_id)
    }
}
