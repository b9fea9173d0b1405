use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::HandlerErr;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing params.{}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn get_required_f64(params: &serde_json::Value, key: &str) -> Result<f64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .filter(|n| n.is_finite())
        .ok_or_else(|| HandlerErr::bad_params(format!("params.{} must be a number", key)))
}

/// Deserializes `params[key]`. Engine validation failures raised inside a
/// `try_from` surface as `bad_params` with the engine message.
pub fn parse_param<T: DeserializeOwned>(
    params: &serde_json::Value,
    key: &str,
) -> Result<T, HandlerErr> {
    let Some(raw) = params.get(key) else {
        return Err(HandlerErr::bad_params(format!("missing params.{}", key)));
    };
    serde_json::from_value(raw.clone())
        .map_err(|e| HandlerErr::bad_params(format!("params.{}: {}", key, e)))
}

pub fn parse_optional_param<T: DeserializeOwned>(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<T>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(_) => parse_param(params, key).map(Some),
    }
}

pub fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, HandlerErr> {
    serde_json::to_value(value).map_err(|e| HandlerErr {
        code: "serialize_failed",
        message: e.to_string(),
        details: None,
    })
}
