use gradingd::rounding::{RoundingMode, RoundingRule, MAX_DECIMAL_PLACES};

use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};

const MAX_SETTING_DECIMAL_PLACES: i64 = 4;

#[derive(Clone, Copy)]
enum SetupSection {
    Grading,
    Alternative,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "grading" => Some(Self::Grading),
            "alternative" => Some(Self::Alternative),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Grading => "setup.grading",
            Self::Alternative => "setup.alternative",
        }
    }
}

fn default_section(state: &AppState, section: SetupSection) -> Value {
    match section {
        SetupSection::Grading => {
            let rounding = state.defaults.rounding;
            json!({
                "defaultRoundingType": rounding.mode.as_str(),
                "defaultDecimalPlaces": rounding.decimal_places.min(MAX_SETTING_DECIMAL_PLACES as u32)
            })
        }
        SetupSection::Alternative => json!({
            "defaultScale": state.defaults.scale
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn merge_section_patch(
    state: &AppState,
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Grading => match k.as_str() {
                "defaultRoundingType" => {
                    let s = parse_string_max(v, k, 16)?;
                    let mode = RoundingMode::parse(&s).ok_or_else(|| {
                        "defaultRoundingType must be one of: none, up, down, nearest".to_string()
                    })?;
                    obj.insert(k.clone(), Value::String(mode.as_str().to_string()));
                }
                "defaultDecimalPlaces" => {
                    obj.insert(
                        k.clone(),
                        Value::from(parse_i64_range(v, k, 0, MAX_SETTING_DECIMAL_PLACES)?),
                    );
                }
                _ => return Err(format!("unknown grading field: {}", k)),
            },
            SetupSection::Alternative => match k.as_str() {
                "defaultScale" => {
                    let s = parse_string_max(v, k, 64)?;
                    if !state.scales.contains_key(&s) {
                        return Err(format!("defaultScale must name a registered scale: {}", s));
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                _ => return Err(format!("unknown alternative field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(state: &AppState, section: SetupSection) -> Value {
    let mut current = default_section(state, section);
    if let Some(saved_obj) = state
        .settings_get_json(section.key())
        .and_then(|v| v.as_object())
    {
        // Stale entries (e.g. a scale that no longer validates) fall back to defaults.
        let _ = merge_section_patch(state, section, &mut current, saved_obj);
    }
    current
}

/// Rounding applied to keys defined without an explicit rule.
pub fn default_rounding(state: &AppState) -> RoundingRule {
    let grading = load_section(state, SetupSection::Grading);
    let mode = grading
        .get("defaultRoundingType")
        .and_then(|v| v.as_str())
        .and_then(RoundingMode::parse)
        .unwrap_or(state.defaults.rounding.mode);
    let places = grading
        .get("defaultDecimalPlaces")
        .and_then(|v| v.as_u64())
        .map(|n| (n as u32).min(MAX_DECIMAL_PLACES))
        .unwrap_or(state.defaults.rounding.decimal_places);
    RoundingRule::new(mode, places)
}

/// Scale used by alternative conversions that do not name one.
pub fn default_scale(state: &AppState) -> String {
    load_section(state, SetupSection::Alternative)
        .get("defaultScale")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| state.defaults.scale.clone())
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "grading": load_section(state, SetupSection::Grading),
            "alternative": load_section(state, SetupSection::Alternative)
        }),
    )
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = load_section(state, section);
    if let Err(msg) = merge_section_patch(state, section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    state.settings_set_json(section.key(), current);
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
