use tracing::{debug, warn};

use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

type Handler = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const HANDLERS: &[Handler] = &[
    handlers::core::try_handle,
    handlers::setup::try_handle,
    handlers::grading_keys::try_handle,
    handlers::lookup::try_handle,
    handlers::alternative::try_handle,
    handlers::criteria::try_handle,
    handlers::exams::try_handle,
    handlers::corrections::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    debug!(id = %req.id, method = %req.method, "request");

    let resp = HANDLERS
        .iter()
        .find_map(|handler| handler(state, &req))
        .unwrap_or_else(|| {
            err(
                &req.id,
                "not_implemented",
                format!("unknown method: {}", req.method),
                None,
            )
        });

    if resp.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = resp
            .pointer("/error/code")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        warn!(id = %req.id, method = %req.method, code, "request failed");
    }
    resp
}
