use gradingd::{GradingError, Part, TaskNode, TaskTree};
use serde_json::json;

use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str, parse_optional_param, parse_param, to_json};
use crate::ipc::types::{AppState, Exam, Request};

fn exams_define(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    let tasks: Vec<TaskNode> = parse_param(params, "tasks")?;
    let parts: Vec<Part> = parse_optional_param(params, "parts")?.unwrap_or_default();

    if state.exam_has_corrections(&exam_id) {
        return Err(GradingError::Structure(format!(
            "exam {} already has corrections; its task structure is frozen",
            exam_id
        ))
        .into());
    }

    let tree = TaskTree::build(tasks)?;
    for part in &parts {
        tree.validate_part(part)?;
    }
    let rollup = tree.rollup();
    state.exams.insert(exam_id.clone(), Exam { tree, parts });
    Ok(json!({ "examId": exam_id, "rollup": to_json(&rollup)? }))
}

fn exams_rollup(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    let exam = state
        .exams
        .get(&exam_id)
        .ok_or_else(|| HandlerErr::not_found("exam", &exam_id))?;
    to_json(&exam.tree.rollup())
}

/// Sub-scores of every part for one correction. `keyId` overrides the key
/// the correction was created with.
fn exams_part_scores(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let correction_id = get_required_str(params, "correctionId")?;
    let entry = state
        .corrections
        .get(&correction_id)
        .ok_or_else(|| HandlerErr::not_found("correction", &correction_id))?;
    let exam = state
        .exams
        .get(&entry.exam_id)
        .ok_or_else(|| HandlerErr::not_found("exam", &entry.exam_id))?;
    let key_id = get_optional_str(params, "keyId").unwrap_or_else(|| entry.grading_key_id.clone());
    let key = state.keys.get(&key_id);

    let scores = entry.score_map();
    let mut out = Vec::with_capacity(exam.parts.len());
    for part in &exam.parts {
        if let Some(score) = exam.tree.part_score(part, &scores, key)? {
            out.push(score);
        }
    }
    Ok(json!({ "parts": to_json(&out)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "exams.define" => exams_define(state, &req.params),
        "exams.rollup" => exams_rollup(state, &req.params),
        "exams.partScores" => exams_part_scores(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    })
}
