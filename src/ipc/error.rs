use gradingd::GradingError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(kind: &str, id: &str) -> Self {
        Self {
            code: "not_found",
            message: format!("{} not found", kind),
            details: Some(json!({ "kind": kind, "id": id })),
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<GradingError> for HandlerErr {
    fn from(e: GradingError) -> Self {
        let details = match &e {
            GradingError::LockedConfiguration { key_id } => Some(json!({ "keyId": key_id })),
            GradingError::NoMatch { table_id } => Some(json!({ "tableId": table_id })),
            GradingError::UnknownSymbol { symbol, scale } => {
                Some(json!({ "symbol": symbol, "scale": scale }))
            }
            GradingError::MissingValue(name) => Some(json!({ "name": name })),
            GradingError::Incomplete { missing } => Some(json!({ "missing": missing })),
            GradingError::ImmutableRecord { entry_id } => {
                Some(json!({ "correctionId": entry_id }))
            }
            GradingError::InvalidTransition { from, to } => {
                Some(json!({ "from": from, "to": to }))
            }
            GradingError::InvalidState { expected, actual } => {
                Some(json!({ "expected": expected, "actual": actual }))
            }
            GradingError::UnknownTask(task_id) => Some(json!({ "taskId": task_id })),
            GradingError::InvalidScore {
                task_id,
                points,
                max_points,
            } => Some(json!({ "taskId": task_id, "points": points, "maxPoints": max_points })),
            GradingError::Structure(_)
            | GradingError::Configuration(_)
            | GradingError::Division(_) => None,
        };
        Self {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}
