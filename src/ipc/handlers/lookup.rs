use std::collections::HashMap;

use gradingd::lookup::TableEntry;
use gradingd::{lookup, lookup_points, ContextValue, LookupTable};
use serde_json::json;

use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str, parse_param, to_json};
use crate::ipc::types::{AppState, Request};

fn tables_upsert(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let table_params = params
        .get("table")
        .filter(|v| v.is_object())
        .ok_or_else(|| HandlerErr::bad_params("params.table must be an object"))?;
    let id = get_required_str(table_params, "id")?;
    let name = get_optional_str(table_params, "name").unwrap_or_else(|| id.clone());
    let entries: Vec<TableEntry> = parse_param(table_params, "entries")?;

    let table = LookupTable::new(id.clone(), name, entries)?;
    let dimensions: Vec<String> = table.dimensions().into_iter().map(str::to_string).collect();
    let entry_count = table.entries().len();
    state.tables.insert(id.clone(), table);
    Ok(json!({
        "tableId": id,
        "entries": entry_count,
        "dimensions": dimensions
    }))
}

/// Resolves a context against a table. With `keyId` the value is read as
/// points and graded with that key.
fn lookup_resolve(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let table_id = get_required_str(params, "tableId")?;
    let context: HashMap<String, ContextValue> = parse_param(params, "context")?;
    let table = state
        .tables
        .get(&table_id)
        .ok_or_else(|| HandlerErr::not_found("lookupTable", &table_id))?;

    let Some(key_id) = get_optional_str(params, "keyId") else {
        let value = lookup(table, &context)?;
        return Ok(json!({ "value": to_json(value)? }));
    };

    let key = state
        .keys
        .get(&key_id)
        .ok_or_else(|| HandlerErr::not_found("gradingKey", &key_id))?;
    let points = lookup_points(table, &context)?;
    let resolution = key.resolve_grade(points)?;
    Ok(json!({ "value": points, "grade": to_json(&resolution)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "lookupTables.upsert" => tables_upsert(state, &req.params),
        "lookup.resolve" => lookup_resolve(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    })
}
