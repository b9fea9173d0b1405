use gradingd::alternative::WeightedSymbol;
use gradingd::{to_points, to_symbol, weighted_average, AlternativeScale, ScaleEntry};
use serde_json::json;

use super::setup::default_scale;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{
    get_optional_str, get_required_f64, get_required_str, parse_param, to_json,
};
use crate::ipc::types::{AppState, Request};

/// `params.scale` when given, otherwise the configured default scale.
pub fn resolve_scale<'s>(
    state: &'s AppState,
    params: &serde_json::Value,
) -> Result<&'s AlternativeScale, HandlerErr> {
    let name = get_optional_str(params, "scale").unwrap_or_else(|| default_scale(state));
    state
        .scales
        .get(&name)
        .ok_or_else(|| HandlerErr::not_found("scale", &name))
}

fn scales_list(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let mut scales: Vec<&AlternativeScale> = state.scales.values().collect();
    scales.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(json!({
        "defaultScale": default_scale(state),
        "scales": to_json(&scales)?
    }))
}

fn scales_upsert(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let scale_params = params
        .get("scale")
        .filter(|v| v.is_object())
        .ok_or_else(|| HandlerErr::bad_params("params.scale must be an object"))?;
    let name = get_required_str(scale_params, "name")?;
    let entries: Vec<ScaleEntry> = parse_param(scale_params, "entries")?;
    let scale = AlternativeScale::new(name.clone(), entries)?;
    let result = to_json(&scale)?;
    state.scales.insert(name, scale);
    Ok(json!({ "scale": result }))
}

fn convert_to_points(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let symbol = get_required_str(params, "symbol")?;
    let max_points = get_required_f64(params, "maxPoints")?;
    let scale = resolve_scale(state, params)?;
    let points = to_points(&symbol, max_points, scale)?;
    Ok(json!({ "points": points, "scale": scale.name }))
}

fn convert_to_symbol(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let points = get_required_f64(params, "points")?;
    let max_points = get_required_f64(params, "maxPoints")?;
    let scale = resolve_scale(state, params)?;
    Ok(json!({ "symbol": to_symbol(points, max_points, scale), "scale": scale.name }))
}

fn convert_weighted_average(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let entries: Vec<WeightedSymbol> = parse_param(params, "entries")?;
    let scale = resolve_scale(state, params)?;
    let average = weighted_average(&entries, scale)?;
    Ok(json!({ "average": average, "scale": scale.name }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "scales.list" => scales_list(state),
        "scales.upsert" => scales_upsert(state, &req.params),
        "alternative.toPoints" => convert_to_points(state, &req.params),
        "alternative.toSymbol" => convert_to_symbol(state, &req.params),
        "alternative.weightedAverage" => convert_weighted_average(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    })
}
