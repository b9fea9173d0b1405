//! One grading pass for one candidate.
//!
//! Lifecycle: `draft → in-progress → completed`, plus `completed →
//! in-progress` (reopen). Scores only change while in progress. Each mutation
//! works on a copy of the score list and commits only after the totals were
//! recomputed successfully, so a failed call leaves the entry untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::alternative::{to_points, AlternativeScale};
use crate::error::{GradingError, GradingResult};
use crate::grading_key::GradingKey;
use crate::task_tree::TaskTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorrectionStatus {
    Draft,
    InProgress,
    Completed,
}

impl CorrectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for CorrectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskScore {
    pub task_id: String,
    pub points: f64,
    pub max_points: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionEntry {
    pub id: String,
    pub exam_id: String,
    pub candidate_id: String,
    pub grading_key_id: String,
    pub scores: Vec<TaskScore>,
    pub total_points: f64,
    pub total_grade: String,
    pub percentage_score: f64,
    pub comments: String,
    pub support_tips: String,
    pub status: CorrectionStatus,
    pub corrected_at: Option<DateTime<Utc>>,
    pub last_modified: DateTime<Utc>,
}

impl CorrectionEntry {
    pub fn score_for(&self, task_id: &str) -> Option<&TaskScore> {
        self.scores.iter().find(|s| s.task_id == task_id)
    }

    pub fn score_map(&self) -> HashMap<String, f64> {
        score_map(&self.scores)
    }
}

fn score_map(scores: &[TaskScore]) -> HashMap<String, f64> {
    scores
        .iter()
        .map(|s| (s.task_id.clone(), s.points))
        .collect()
}

/// Drives a [`CorrectionEntry`] against a frozen task tree and its grading key.
pub struct CorrectionRecorder<'a> {
    tree: &'a TaskTree,
    key: &'a mut GradingKey,
}

impl<'a> CorrectionRecorder<'a> {
    pub fn new(tree: &'a TaskTree, key: &'a mut GradingKey) -> Self {
        Self { tree, key }
    }

    /// New draft entry for one candidate.
    pub fn create(
        exam_id: impl Into<String>,
        candidate_id: impl Into<String>,
        grading_key_id: impl Into<String>,
    ) -> CorrectionEntry {
        CorrectionEntry {
            id: Uuid::new_v4().to_string(),
            exam_id: exam_id.into(),
            candidate_id: candidate_id.into(),
            grading_key_id: grading_key_id.into(),
            scores: Vec::new(),
            total_points: 0.0,
            total_grade: String::new(),
            percentage_score: 0.0,
            comments: String::new(),
            support_tips: String::new(),
            status: CorrectionStatus::Draft,
            corrected_at: None,
            last_modified: Utc::now(),
        }
    }

    /// Draft to in-progress only; a completed record goes back through `reopen`.
    pub fn start(&self, entry: &mut CorrectionEntry) -> GradingResult<()> {
        transition_guard(entry.status, CorrectionStatus::InProgress)?;
        entry.status = CorrectionStatus::InProgress;
        entry.last_modified = Utc::now();
        Ok(())
    }

    pub fn record_score(
        &self,
        entry: &mut CorrectionEntry,
        task_id: &str,
        points: f64,
    ) -> GradingResult<()> {
        self.apply_score(entry, task_id, points, None)
    }

    /// Converts an alternative symbol with the task's points as maximum.
    pub fn record_symbol(
        &self,
        entry: &mut CorrectionEntry,
        task_id: &str,
        symbol: &str,
        scale: &AlternativeScale,
    ) -> GradingResult<()> {
        let task = self
            .tree
            .get(task_id)
            .ok_or_else(|| GradingError::UnknownTask(task_id.to_string()))?;
        let points = to_points(symbol, task.points, scale)?;
        self.apply_score(entry, task_id, points, Some(symbol.trim().to_string()))
    }

    pub fn clear_score(&self, entry: &mut CorrectionEntry, task_id: &str) -> GradingResult<()> {
        ensure_editable(entry)?;
        if self.tree.get(task_id).is_none() {
            return Err(GradingError::UnknownTask(task_id.to_string()));
        }
        let mut scores = entry.scores.clone();
        scores.retain(|s| s.task_id != task_id);
        self.commit(entry, scores)
    }

    pub fn set_comments(&self, entry: &mut CorrectionEntry, comments: &str) -> GradingResult<()> {
        ensure_editable(entry)?;
        entry.comments = comments.to_string();
        entry.last_modified = Utc::now();
        Ok(())
    }

    pub fn set_support_tips(&self, entry: &mut CorrectionEntry, tips: &str) -> GradingResult<()> {
        ensure_editable(entry)?;
        entry.support_tips = tips.to_string();
        entry.last_modified = Utc::now();
        Ok(())
    }

    /// Finalizes the entry. Every scorable task needs a score; the grading key
    /// is locked against further boundary edits.
    pub fn complete(&mut self, entry: &mut CorrectionEntry) -> GradingResult<()> {
        transition_guard(entry.status, CorrectionStatus::Completed)?;
        let scores = score_map(&entry.scores);
        let missing = self.tree.missing_scores(&scores);
        if !missing.is_empty() {
            return Err(GradingError::Incomplete { missing });
        }

        let achieved = self.tree.rollup_scores(&scores).total_achieved;
        let resolution = self.key.resolve_for_correction(achieved)?;
        let now = Utc::now();
        entry.total_points = achieved;
        entry.percentage_score = resolution.percentage;
        entry.total_grade = resolution.display_value;
        entry.status = CorrectionStatus::Completed;
        entry.corrected_at = Some(now);
        entry.last_modified = now;
        Ok(())
    }

    pub fn reopen(&self, entry: &mut CorrectionEntry) -> GradingResult<()> {
        if entry.status != CorrectionStatus::Completed {
            return Err(GradingError::InvalidTransition {
                from: entry.status.to_string(),
                to: CorrectionStatus::InProgress.to_string(),
            });
        }
        entry.status = CorrectionStatus::InProgress;
        entry.last_modified = Utc::now();
        Ok(())
    }

    fn apply_score(
        &self,
        entry: &mut CorrectionEntry,
        task_id: &str,
        points: f64,
        symbol: Option<String>,
    ) -> GradingResult<()> {
        ensure_editable(entry)?;
        let task = self
            .tree
            .get(task_id)
            .ok_or_else(|| GradingError::UnknownTask(task_id.to_string()))?;
        if !task.is_scorable() {
            return Err(GradingError::InvalidScore {
                task_id: task_id.to_string(),
                points,
                max_points: 0.0,
            });
        }
        let max_points = task.max_awardable();
        if !points.is_finite() || points < 0.0 || points > max_points {
            return Err(GradingError::InvalidScore {
                task_id: task_id.to_string(),
                points,
                max_points,
            });
        }

        let score = TaskScore {
            task_id: task_id.to_string(),
            points,
            max_points,
            symbol,
            timestamp: Utc::now(),
        };
        let mut scores = entry.scores.clone();
        match scores.iter_mut().find(|s| s.task_id == task_id) {
            Some(existing) => *existing = score,
            None => scores.push(score),
        }
        self.commit(entry, scores)
    }

    /// Recomputes totals for `scores` and stores both on success.
    fn commit(&self, entry: &mut CorrectionEntry, scores: Vec<TaskScore>) -> GradingResult<()> {
        let achieved = self.tree.rollup_scores(&score_map(&scores)).total_achieved;
        let resolution = self.key.resolve_grade(achieved)?;
        entry.scores = scores;
        entry.total_points = achieved;
        entry.percentage_score = resolution.percentage;
        entry.total_grade = resolution.display_value;
        entry.last_modified = Utc::now();
        Ok(())
    }
}

fn ensure_editable(entry: &CorrectionEntry) -> GradingResult<()> {
    match entry.status {
        CorrectionStatus::InProgress => Ok(()),
        CorrectionStatus::Completed => Err(GradingError::ImmutableRecord {
            entry_id: entry.id.clone(),
        }),
        CorrectionStatus::Draft => Err(GradingError::InvalidState {
            expected: CorrectionStatus::InProgress.to_string(),
            actual: entry.status.to_string(),
        }),
    }
}

fn transition_guard(from: CorrectionStatus, to: CorrectionStatus) -> GradingResult<()> {
    let allowed = matches!(
        (from, to),
        (CorrectionStatus::Draft, CorrectionStatus::InProgress)
            | (CorrectionStatus::InProgress, CorrectionStatus::Completed)
    );
    if allowed {
        Ok(())
    } else {
        Err(GradingError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading_key::{GradeBoundary, GradingKeyType};
    use crate::presets::standard_scale;
    use crate::rounding::RoundingRule;
    use crate::task_tree::TaskNode;

    fn tree() -> TaskTree {
        TaskTree::build(vec![
            TaskNode::new("t1", 1, 6.0).with_bonus(2.0),
            TaskNode::new("t2", 1, 0.0).with_order(1).with_children(["t2a", "t2b"]),
            TaskNode::new("t2a", 2, 2.0).with_parent("t2"),
            TaskNode::new("t2b", 2, 2.0).with_parent("t2").with_order(1),
        ])
        .unwrap()
    }

    fn key() -> GradingKey {
        GradingKey::new(
            "key",
            "pass/fail",
            GradingKeyType::Percentage,
            10.0,
            vec![
                GradeBoundary::new("pass", 50.0, 100.0),
                GradeBoundary::new("fail", 0.0, 49.99),
            ],
            RoundingRule::none(),
        )
        .unwrap()
    }

    #[test]
    fn draft_cannot_be_scored_or_completed() {
        let tree = tree();
        let mut key = key();
        let mut rec = CorrectionRecorder::new(&tree, &mut key);
        let mut entry = CorrectionRecorder::create("exam", "kid", "key");
        assert!(matches!(
            rec.record_score(&mut entry, "t1", 1.0),
            Err(GradingError::InvalidState { .. })
        ));
        assert!(matches!(
            rec.complete(&mut entry),
            Err(GradingError::InvalidTransition { .. })
        ));
        assert_eq!(entry.status, CorrectionStatus::Draft);
    }

    #[test]
    fn scores_recompute_totals() {
        let tree = tree();
        let mut key = key();
        let rec = CorrectionRecorder::new(&tree, &mut key);
        let mut entry = CorrectionRecorder::create("exam", "kid", "key");
        rec.start(&mut entry).unwrap();
        rec.record_score(&mut entry, "t1", 3.0).unwrap();
        assert_eq!(entry.total_points, 3.0);
        assert_eq!(entry.total_grade, "fail");
        rec.record_score(&mut entry, "t2a", 2.0).unwrap();
        assert_eq!(entry.total_points, 5.0);
        assert_eq!(entry.total_grade, "pass");
        assert_eq!(entry.percentage_score, 50.0);
        rec.record_score(&mut entry, "t1", 4.0).unwrap();
        assert_eq!(entry.scores.len(), 2);
        assert_eq!(entry.total_points, 6.0);
    }

    #[test]
    fn invalid_scores_leave_entry_untouched() {
        let tree = tree();
        let mut key = key();
        let rec = CorrectionRecorder::new(&tree, &mut key);
        let mut entry = CorrectionRecorder::create("exam", "kid", "key");
        rec.start(&mut entry).unwrap();
        rec.record_score(&mut entry, "t1", 8.0).unwrap();
        let before = entry.clone();
        assert!(matches!(
            rec.record_score(&mut entry, "t1", 8.5),
            Err(GradingError::InvalidScore { .. })
        ));
        assert!(matches!(
            rec.record_score(&mut entry, "t2", 1.0),
            Err(GradingError::InvalidScore { .. })
        ));
        assert!(matches!(
            rec.record_score(&mut entry, "ghost", 1.0),
            Err(GradingError::UnknownTask(_))
        ));
        assert_eq!(entry, before);
    }

    #[test]
    fn symbols_convert_against_task_points() {
        let tree = tree();
        let mut key = key();
        let rec = CorrectionRecorder::new(&tree, &mut key);
        let mut entry = CorrectionRecorder::create("exam", "kid", "key");
        rec.start(&mut entry).unwrap();
        rec.record_symbol(&mut entry, "t1", "+", &standard_scale())
            .unwrap();
        // 6 * 0.85 = 5.1 -> 5
        let score = entry.score_for("t1").unwrap();
        assert_eq!(score.points, 5.0);
        assert_eq!(score.symbol.as_deref(), Some("+"));
    }

    #[test]
    fn completion_requires_every_task_and_locks_key() {
        let tree = tree();
        let mut key = key();
        let mut entry = CorrectionRecorder::create("exam", "kid", "key");
        {
            let mut rec = CorrectionRecorder::new(&tree, &mut key);
            rec.start(&mut entry).unwrap();
            rec.record_score(&mut entry, "t1", 6.0).unwrap();
            rec.record_score(&mut entry, "t2a", 1.0).unwrap();
            match rec.complete(&mut entry) {
                Err(GradingError::Incomplete { missing }) => assert_eq!(missing, vec!["t2b"]),
                other => panic!("expected incomplete, got {:?}", other),
            }
            rec.record_score(&mut entry, "t2b", 2.0).unwrap();
            rec.complete(&mut entry).unwrap();
            assert_eq!(entry.status, CorrectionStatus::Completed);
            assert!(entry.corrected_at.is_some());
            assert!(matches!(
                rec.record_score(&mut entry, "t1", 1.0),
                Err(GradingError::ImmutableRecord { .. })
            ));
            assert!(matches!(
                rec.set_comments(&mut entry, "late"),
                Err(GradingError::ImmutableRecord { .. })
            ));
            assert!(matches!(
                rec.start(&mut entry),
                Err(GradingError::InvalidTransition { .. })
            ));
            assert_eq!(entry.status, CorrectionStatus::Completed);
            rec.reopen(&mut entry).unwrap();
            rec.record_score(&mut entry, "t1", 1.0).unwrap();
            rec.complete(&mut entry).unwrap();
            assert_eq!(entry.total_points, 4.0);
            assert_eq!(entry.total_grade, "fail");
        }
        assert!(key.modified_after_correction());
    }

    #[test]
    fn reopen_only_from_completed() {
        let tree = tree();
        let mut key = key();
        let rec = CorrectionRecorder::new(&tree, &mut key);
        let mut entry = CorrectionRecorder::create("exam", "kid", "key");
        assert!(matches!(
            rec.reopen(&mut entry),
            Err(GradingError::InvalidTransition { .. })
        ));
        rec.start(&mut entry).unwrap();
        assert!(matches!(
            rec.start(&mut entry),
            Err(GradingError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn start_does_not_reopen_a_completed_entry() {
        let tree = tree();
        let mut key = key();
        let mut rec = CorrectionRecorder::new(&tree, &mut key);
        let mut entry = CorrectionRecorder::create("exam", "kid", "key");
        rec.start(&mut entry).unwrap();
        for (task, points) in [("t1", 6.0), ("t2a", 1.0), ("t2b", 2.0)] {
            rec.record_score(&mut entry, task, points).unwrap();
        }
        rec.complete(&mut entry).unwrap();
        let corrected_at = entry.corrected_at;
        match rec.start(&mut entry) {
            Err(GradingError::InvalidTransition { from, to }) => {
                assert_eq!(from, "completed");
                assert_eq!(to, "in-progress");
            }
            other => panic!("expected invalid transition, got {:?}", other),
        }
        assert_eq!(entry.status, CorrectionStatus::Completed);
        assert_eq!(entry.corrected_at, corrected_at);
    }
}
