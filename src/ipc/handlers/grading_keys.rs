use gradingd::presets::KeyPreset;
use gradingd::{GradeBoundary, GradingError, GradingKey, GradingKeyType, RoundingRule};
use serde_json::json;

use super::setup::default_rounding;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{
    get_optional_str, get_required_f64, get_required_str, parse_optional_param, parse_param,
    to_json,
};
use crate::ipc::types::{AppState, Request};

fn ensure_unlocked(state: &AppState, key_id: &str) -> Result<(), HandlerErr> {
    match state.keys.get(key_id) {
        Some(existing) if existing.modified_after_correction() => {
            Err(GradingError::LockedConfiguration {
                key_id: key_id.to_string(),
            }
            .into())
        }
        _ => Ok(()),
    }
}

fn keys_upsert(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let key_params = params
        .get("key")
        .filter(|v| v.is_object())
        .ok_or_else(|| HandlerErr::bad_params("params.key must be an object"))?;

    let id = get_required_str(key_params, "id")?;
    let name = get_optional_str(key_params, "name").unwrap_or_else(|| id.clone());
    let key_type: GradingKeyType = parse_param(key_params, "type")?;
    let total_points = get_required_f64(key_params, "totalPoints")?;
    let boundaries: Vec<GradeBoundary> = parse_param(key_params, "boundaries")?;
    let rounding = parse_optional_param::<RoundingRule>(key_params, "rounding")?
        .unwrap_or_else(|| default_rounding(state));
    let inverted = parse_optional_param::<bool>(key_params, "errorPointsToGrade")?;
    let customizable = parse_optional_param::<bool>(key_params, "customizable")?.unwrap_or(true);

    ensure_unlocked(state, &id)?;

    let mut key = GradingKey::new(id.clone(), name, key_type, total_points, boundaries, rounding)?
        .with_customizable(customizable);
    if let Some(inverted) = inverted {
        key = key.with_error_points_to_grade(inverted);
    }
    let result = to_json(&key)?;
    state.keys.insert(id, key);
    Ok(json!({ "key": result }))
}

fn keys_preset(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let preset_raw = get_required_str(params, "preset")?;
    let preset = KeyPreset::parse(&preset_raw).ok_or_else(|| {
        HandlerErr::bad_params("preset must be one of: sixGrade, fifteenPoint")
    })?;
    let total_points = get_required_f64(params, "totalPoints")?;
    let rounding = parse_optional_param::<RoundingRule>(params, "rounding")?
        .unwrap_or_else(|| default_rounding(state));

    ensure_unlocked(state, &id)?;

    let key = preset.build(id.clone(), total_points, rounding)?;
    let result = to_json(&key)?;
    state.keys.insert(id, key);
    Ok(json!({ "key": result }))
}

fn keys_get(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let key = state
        .keys
        .get(&id)
        .ok_or_else(|| HandlerErr::not_found("gradingKey", &id))?;
    Ok(json!({ "key": to_json(key)? }))
}

/// Applies boundary, rounding and total edits together; nothing changes when
/// any of them is rejected.
fn keys_update_boundaries(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let boundaries: Vec<GradeBoundary> = parse_param(params, "boundaries")?;
    let rounding = parse_optional_param::<RoundingRule>(params, "rounding")?;
    let total_points = parse_optional_param::<f64>(params, "totalPoints")?;

    let current = state
        .keys
        .get(&id)
        .ok_or_else(|| HandlerErr::not_found("gradingKey", &id))?;
    let mut updated = current.clone();
    updated.set_boundaries(boundaries)?;
    if let Some(rounding) = rounding {
        updated.set_rounding(rounding)?;
    }
    if let Some(total_points) = total_points {
        updated.set_total_points(total_points)?;
    }
    let result = to_json(&updated)?;
    state.keys.insert(id, updated);
    Ok(json!({ "key": result }))
}

fn grading_resolve(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let key_id = get_required_str(params, "keyId")?;
    let total_points = get_required_f64(params, "totalPoints")?;
    let key = state
        .keys
        .get(&key_id)
        .ok_or_else(|| HandlerErr::not_found("gradingKey", &key_id))?;
    let resolution = key.resolve_grade(total_points)?;
    to_json(&resolution)
}

fn grading_points_to_next(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let key_id = get_required_str(params, "keyId")?;
    let total_points = get_required_f64(params, "totalPoints")?;
    let key = state
        .keys
        .get(&key_id)
        .ok_or_else(|| HandlerErr::not_found("gradingKey", &key_id))?;
    let needed = key.points_to_next_grade(total_points)?;
    Ok(json!({ "pointsNeeded": needed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "gradingKeys.upsert" => keys_upsert(state, &req.params),
        "gradingKeys.preset" => keys_preset(state, &req.params),
        "gradingKeys.get" => keys_get(state, &req.params),
        "gradingKeys.updateBoundaries" => keys_update_boundaries(state, &req.params),
        "grading.resolve" => grading_resolve(state, &req.params),
        "grading.pointsToNextGrade" => grading_points_to_next(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    })
}
