use std::collections::HashMap;

use gradingd::{aggregate, CriterionConfig};
use serde_json::json;

use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{get_optional_str, parse_param, to_json};
use crate::ipc::types::{AppState, Request};

fn criteria_aggregate(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let criteria: Vec<CriterionConfig> = parse_param(params, "criteria")?;
    let values: HashMap<String, f64> = parse_param(params, "values")?;
    let result = aggregate(&criteria, &values)?;

    let mut out = to_json(&result)?;
    if let Some(key_id) = get_optional_str(params, "keyId") {
        let key = state
            .keys
            .get(&key_id)
            .ok_or_else(|| HandlerErr::not_found("gradingKey", &key_id))?;
        out["grade"] = to_json(&result.grade(key)?)?;
    }
    Ok(out)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "criteria.aggregate" => criteria_aggregate(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    })
}
