use gradingd::{summarize, AlternativeScale, CorrectionRecorder};
use serde_json::json;

use super::alternative::resolve_scale;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_f64, get_required_str, to_json};
use crate::ipc::types::{AppState, Request};

enum Edit {
    Start,
    SetScore { task_id: String, points: f64 },
    SetSymbol {
        task_id: String,
        symbol: String,
        scale: AlternativeScale,
    },
    ClearScore { task_id: String },
    SetComments {
        comments: Option<String>,
        support_tips: Option<String>,
    },
    Complete,
    Reopen,
}

fn corrections_create(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    let candidate_id = get_required_str(params, "candidateId")?;
    let key_id = get_required_str(params, "gradingKeyId")?;
    if !state.exams.contains_key(&exam_id) {
        return Err(HandlerErr::not_found("exam", &exam_id));
    }
    if !state.keys.contains_key(&key_id) {
        return Err(HandlerErr::not_found("gradingKey", &key_id));
    }

    let entry = CorrectionRecorder::create(exam_id, candidate_id, key_id);
    let result = to_json(&entry)?;
    state.corrections.insert(entry.id.clone(), entry);
    Ok(json!({ "correction": result }))
}

/// Runs one edit against a copy of the entry and stores it only on success.
fn apply_edit(
    state: &mut AppState,
    correction_id: &str,
    edit: Edit,
) -> Result<serde_json::Value, HandlerErr> {
    let mut entry = state
        .corrections
        .get(correction_id)
        .cloned()
        .ok_or_else(|| HandlerErr::not_found("correction", correction_id))?;
    let exam = state
        .exams
        .get(&entry.exam_id)
        .ok_or_else(|| HandlerErr::not_found("exam", &entry.exam_id))?;
    let key = state
        .keys
        .get_mut(&entry.grading_key_id)
        .ok_or_else(|| HandlerErr::not_found("gradingKey", &entry.grading_key_id))?;

    let mut recorder = CorrectionRecorder::new(&exam.tree, key);
    match edit {
        Edit::Start => recorder.start(&mut entry)?,
        Edit::SetScore { task_id, points } => recorder.record_score(&mut entry, &task_id, points)?,
        Edit::SetSymbol {
            task_id,
            symbol,
            scale,
        } => recorder.record_symbol(&mut entry, &task_id, &symbol, &scale)?,
        Edit::ClearScore { task_id } => recorder.clear_score(&mut entry, &task_id)?,
        Edit::SetComments {
            comments,
            support_tips,
        } => {
            if let Some(comments) = comments {
                recorder.set_comments(&mut entry, &comments)?;
            }
            if let Some(tips) = support_tips {
                recorder.set_support_tips(&mut entry, &tips)?;
            }
        }
        Edit::Complete => recorder.complete(&mut entry)?,
        Edit::Reopen => recorder.reopen(&mut entry)?,
    }

    let result = to_json(&entry)?;
    state.corrections.insert(entry.id.clone(), entry);
    Ok(json!({ "correction": result }))
}

fn parse_edit(state: &AppState, method: &str, params: &serde_json::Value) -> Result<Option<Edit>, HandlerErr> {
    let edit = match method {
        "corrections.start" => Edit::Start,
        "corrections.setScore" => Edit::SetScore {
            task_id: get_required_str(params, "taskId")?,
            points: get_required_f64(params, "points")?,
        },
        "corrections.setSymbol" => Edit::SetSymbol {
            task_id: get_required_str(params, "taskId")?,
            symbol: get_required_str(params, "symbol")?,
            scale: resolve_scale(state, params)?.clone(),
        },
        "corrections.clearScore" => Edit::ClearScore {
            task_id: get_required_str(params, "taskId")?,
        },
        "corrections.setComments" => {
            let text = |key: &str| params.get(key).and_then(|v| v.as_str()).map(str::to_string);
            let comments = text("comments");
            let support_tips = text("supportTips");
            if comments.is_none() && support_tips.is_none() {
                return Err(HandlerErr::bad_params(
                    "params.comments or params.supportTips is required",
                ));
            }
            Edit::SetComments {
                comments,
                support_tips,
            }
        }
        "corrections.complete" => Edit::Complete,
        "corrections.reopen" => Edit::Reopen,
        _ => return Ok(None),
    };
    Ok(Some(edit))
}

fn corrections_get(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let correction_id = get_required_str(params, "correctionId")?;
    let entry = state
        .corrections
        .get(&correction_id)
        .ok_or_else(|| HandlerErr::not_found("correction", &correction_id))?;
    Ok(json!({ "correction": to_json(entry)? }))
}

fn corrections_summary(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    if !state.exams.contains_key(&exam_id) {
        return Err(HandlerErr::not_found("exam", &exam_id));
    }
    let summary = summarize(
        state
            .corrections
            .values()
            .filter(|c| c.exam_id == exam_id),
    );
    to_json(&summary)
}

fn corrections_list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_optional_str(params, "examId");
    let mut entries: Vec<_> = state
        .corrections
        .values()
        .filter(|c| exam_id.as_deref().map_or(true, |id| c.exam_id == id))
        .collect();
    entries.sort_by(|a, b| a.candidate_id.cmp(&b.candidate_id).then_with(|| a.id.cmp(&b.id)));
    Ok(json!({ "corrections": to_json(&entries)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "corrections.create" => corrections_create(state, &req.params),
        "corrections.get" => corrections_get(state, &req.params),
        "corrections.list" => corrections_list(state, &req.params),
        "corrections.summary" => corrections_summary(state, &req.params),
        method => match parse_edit(state, method, &req.params) {
            Ok(None) => return None,
            Ok(Some(edit)) => get_required_str(&req.params, "correctionId")
                .and_then(|id| apply_edit(state, &id, edit)),
            Err(e) => Err(e),
        },
    };
    Some(match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    })
}
