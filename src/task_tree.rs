//! Task hierarchy of an exam or category: up to three levels of tasks and
//! sub-tasks, each carrying its own points.
//!
//! The tree is an arena of nodes addressed by id. It is validated once in
//! [`TaskTree::build`]; every rollup afterwards is a read-only traversal.
//!
//! Choice groups: siblings flagged `isChoice` that share a `choiceGroup` label
//! are alternatives. Only the best member of a group counts toward the parent:
//! the one with the most points (structural rollup) or the most awarded points
//! (scored rollup), ties going to the lowest `order`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::AddAssign;

use crate::error::{GradingError, GradingResult};
use crate::grading_key::GradingKey;

pub const MAX_LEVEL: u8 = 3;

const SCORE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNode {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub level: u8,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub points: f64,
    #[serde(default)]
    pub bonus_points: f64,
    #[serde(default)]
    pub is_choice: bool,
    #[serde(default)]
    pub choice_group: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
}

impl TaskNode {
    pub fn new(id: impl Into<String>, level: u8, points: f64) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            level,
            order: 0,
            points,
            bonus_points: 0.0,
            is_choice: false,
            choice_group: None,
            children: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.children = children.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    pub fn with_bonus(mut self, bonus_points: f64) -> Self {
        self.bonus_points = bonus_points;
        self
    }

    pub fn in_choice_group(mut self, group: impl Into<String>) -> Self {
        self.is_choice = true;
        self.choice_group = Some(group.into());
        self
    }

    fn choice_label(&self) -> Option<&str> {
        if self.is_choice {
            self.choice_group.as_deref()
        } else {
            None
        }
    }

    /// Leaves always take a score; inner nodes only when they carry own points.
    pub fn is_scorable(&self) -> bool {
        self.children.is_empty() || self.points > 0.0 || self.bonus_points > 0.0
    }

    /// Highest number of points a candidate can be awarded on this task itself.
    pub fn max_awardable(&self) -> f64 {
        self.points + self.bonus_points
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTotal {
    pub points: f64,
    pub bonus_points: f64,
}

impl AddAssign for NodeTotal {
    fn add_assign(&mut self, rhs: Self) {
        self.points += rhs.points;
        self.bonus_points += rhs.bonus_points;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceGroupSelection {
    pub parent_id: Option<String>,
    pub group: String,
    /// Members in `order`.
    pub members: Vec<String>,
    pub selected: String,
}

/// Structural point totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rollup {
    pub totals: HashMap<String, NodeTotal>,
    /// Grading basis: the points that represent 100 %.
    pub total_points: f64,
    pub total_bonus_points: f64,
    pub choice_groups: Vec<ChoiceGroupSelection>,
}

/// Awarded point totals for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredRollup {
    pub achieved: HashMap<String, f64>,
    pub total_achieved: f64,
    pub max_points: f64,
    pub choice_groups: Vec<ChoiceGroupSelection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PartScoreType {
    #[default]
    Points,
    Grade,
}

/// Groups tasks for sub-score reporting. Membership is a plain reference list,
/// independent of the parent/child edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub task_ids: Vec<String>,
    #[serde(default = "default_true")]
    pub calculate_sub_score: bool,
    #[serde(default)]
    pub score_type: PartScoreType,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartScore {
    pub part_id: String,
    pub achieved: f64,
    pub max_points: f64,
    pub percentage: Option<f64>,
    pub grade: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TaskNode>", into = "Vec<TaskNode>")]
pub struct TaskTree {
    nodes: Vec<TaskNode>,
    index: HashMap<String, usize>,
    roots: Vec<usize>,
}

impl TryFrom<Vec<TaskNode>> for TaskTree {
    type Error = GradingError;

    fn try_from(nodes: Vec<TaskNode>) -> Result<Self, Self::Error> {
        TaskTree::build(nodes)
    }
}

impl From<TaskTree> for Vec<TaskNode> {
    fn from(tree: TaskTree) -> Self {
        tree.nodes
    }
}

/// Validates `tasks` and returns their structural point totals.
pub fn rollup(tasks: &[TaskNode]) -> GradingResult<Rollup> {
    Ok(TaskTree::build(tasks.to_vec())?.rollup())
}

impl TaskTree {
    pub fn build(nodes: Vec<TaskNode>) -> GradingResult<Self> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.id.clone(), i).is_some() {
                return Err(GradingError::structure(format!(
                    "duplicate task id: {}",
                    node.id
                )));
            }
        }

        for node in &nodes {
            validate_node(node)?;
        }
        detect_cycles(&nodes, &index)?;

        for node in &nodes {
            match (&node.parent_id, node.level) {
                (Some(_), 1) => {
                    return Err(GradingError::structure(format!(
                        "level-1 task {} must not have a parent",
                        node.id
                    )));
                }
                (None, 1) => {}
                (None, level) => {
                    return Err(GradingError::structure(format!(
                        "level-{} task {} needs a parent",
                        level, node.id
                    )));
                }
                (Some(parent_id), level) => {
                    let parent = index.get(parent_id).map(|&i| &nodes[i]).ok_or_else(|| {
                        GradingError::structure(format!(
                            "task {} references missing parent {}",
                            node.id, parent_id
                        ))
                    })?;
                    if parent.level + 1 != level {
                        return Err(GradingError::structure(format!(
                            "task {} (level {}) has parent {} at level {}",
                            node.id, level, parent.id, parent.level
                        )));
                    }
                    if !parent.children.iter().any(|c| c == &node.id) {
                        return Err(GradingError::structure(format!(
                            "parent {} does not list child {}",
                            parent.id, node.id
                        )));
                    }
                }
            }

            if node.level == MAX_LEVEL && !node.children.is_empty() {
                return Err(GradingError::structure(format!(
                    "level-{} task {} cannot have children",
                    MAX_LEVEL, node.id
                )));
            }
            let mut seen = HashSet::new();
            for child_id in &node.children {
                if !seen.insert(child_id.as_str()) {
                    return Err(GradingError::structure(format!(
                        "task {} lists child {} twice",
                        node.id, child_id
                    )));
                }
                let child = index.get(child_id).map(|&i| &nodes[i]).ok_or_else(|| {
                    GradingError::structure(format!(
                        "task {} references missing child {}",
                        node.id, child_id
                    ))
                })?;
                if child.level != node.level + 1 {
                    return Err(GradingError::structure(format!(
                        "child {} of {} must be at level {}",
                        child.id,
                        node.id,
                        node.level + 1
                    )));
                }
                if child.parent_id.as_deref() != Some(node.id.as_str()) {
                    return Err(GradingError::structure(format!(
                        "child {} of {} names a different parent",
                        child.id, node.id
                    )));
                }
            }
        }

        let roots = nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.level == 1)
            .map(|(i, _)| i)
            .collect();
        Ok(Self {
            nodes,
            index,
            roots,
        })
    }

    pub fn nodes(&self) -> &[TaskNode] {
        &self.nodes
    }

    pub fn get(&self, id: &str) -> Option<&TaskNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn children_of(&self, idx: usize) -> Vec<usize> {
        self.nodes[idx]
            .children
            .iter()
            .filter_map(|c| self.index.get(c).copied())
            .collect()
    }

    /// Splits siblings into plain members and choice groups, all in `order`.
    fn partition(&self, members: &[usize]) -> (Vec<usize>, BTreeMap<String, Vec<usize>>) {
        let mut ordered = members.to_vec();
        ordered.sort_by(|&a, &b| {
            let (na, nb) = (&self.nodes[a], &self.nodes[b]);
            na.order.cmp(&nb.order).then_with(|| na.id.cmp(&nb.id))
        });
        let mut plain = Vec::new();
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for i in ordered {
            match self.nodes[i].choice_label() {
                Some(label) => groups.entry(label.to_string()).or_default().push(i),
                None => plain.push(i),
            }
        }
        (plain, groups)
    }

    fn combine(
        &self,
        members: &[usize],
        parent_id: Option<&str>,
        tallies: &[NodeTotal],
        selections: &mut Vec<ChoiceGroupSelection>,
    ) -> NodeTotal {
        let (plain, groups) = self.partition(members);
        let mut sum = NodeTotal::default();
        for i in plain {
            sum += tallies[i];
        }
        for (label, group) in groups {
            let mut best = group[0];
            for &i in &group[1..] {
                if tallies[i].points > tallies[best].points + SCORE_EPSILON {
                    best = i;
                }
            }
            sum += tallies[best];
            selections.push(ChoiceGroupSelection {
                parent_id: parent_id.map(str::to_string),
                group: label,
                members: group.iter().map(|&i| self.nodes[i].id.clone()).collect(),
                selected: self.nodes[best].id.clone(),
            });
        }
        sum
    }

    /// Bottom-up fold: deepest level first, so children are final before parents.
    fn fold<F>(&self, own: F) -> (Vec<NodeTotal>, NodeTotal, Vec<ChoiceGroupSelection>)
    where
        F: Fn(&TaskNode) -> NodeTotal,
    {
        let mut tallies = vec![NodeTotal::default(); self.nodes.len()];
        let mut selections = Vec::new();
        for level in (1..=MAX_LEVEL).rev() {
            for idx in 0..self.nodes.len() {
                let node = &self.nodes[idx];
                if node.level != level {
                    continue;
                }
                let children = self.children_of(idx);
                let mut total = own(node);
                total += self.combine(&children, Some(&node.id), &tallies, &mut selections);
                tallies[idx] = total;
            }
        }
        let overall = self.combine(&self.roots, None, &tallies, &mut selections);
        (tallies, overall, selections)
    }

    pub fn rollup(&self) -> Rollup {
        let (tallies, overall, choice_groups) = self.fold(|n| NodeTotal {
            points: n.points,
            bonus_points: n.bonus_points,
        });
        Rollup {
            totals: self
                .nodes
                .iter()
                .zip(tallies)
                .map(|(n, t)| (n.id.clone(), t))
                .collect(),
            total_points: overall.points,
            total_bonus_points: overall.bonus_points,
            choice_groups,
        }
    }

    /// Awarded totals from per-task scores (task id → points). Unscored tasks
    /// count as zero; ids not in the tree are ignored.
    pub fn rollup_scores(&self, scores: &HashMap<String, f64>) -> ScoredRollup {
        let (tallies, overall, choice_groups) = self.fold(|n| NodeTotal {
            points: scores.get(&n.id).copied().unwrap_or(0.0),
            bonus_points: 0.0,
        });
        ScoredRollup {
            achieved: self
                .nodes
                .iter()
                .zip(tallies)
                .map(|(n, t)| (n.id.clone(), t.points))
                .collect(),
            total_achieved: overall.points,
            max_points: self.rollup().total_points,
            choice_groups,
        }
    }

    /// Scorable tasks still lacking a score. Choice-group members the
    /// candidate did not take are not required as long as one member subtree
    /// of the group is fully scored.
    pub fn missing_scores(&self, scores: &HashMap<String, f64>) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_missing(&self.roots, scores, &mut out);
        out
    }

    fn collect_missing(&self, members: &[usize], scores: &HashMap<String, f64>, out: &mut Vec<String>) {
        let (plain, groups) = self.partition(members);
        for i in plain {
            self.collect_node_missing(i, scores, out);
        }
        for group in groups.values() {
            let per_member: Vec<Vec<String>> = group
                .iter()
                .map(|&i| {
                    let mut missing = Vec::new();
                    self.collect_node_missing(i, scores, &mut missing);
                    missing
                })
                .collect();
            if per_member.iter().any(Vec::is_empty) {
                continue;
            }
            out.extend(per_member.into_iter().flatten());
        }
    }

    fn collect_node_missing(&self, idx: usize, scores: &HashMap<String, f64>, out: &mut Vec<String>) {
        let node = &self.nodes[idx];
        if node.is_scorable() && !scores.contains_key(&node.id) {
            out.push(node.id.clone());
        }
        self.collect_missing(&self.children_of(idx), scores, out);
    }

    pub fn validate_part(&self, part: &Part) -> GradingResult<()> {
        for task_id in &part.task_ids {
            if !self.index.contains_key(task_id) {
                return Err(GradingError::structure(format!(
                    "part {} references missing task {}",
                    part.id, task_id
                )));
            }
        }
        Ok(())
    }

    /// Sub-score of a part; `None` when the part does not calculate one.
    pub fn part_score(
        &self,
        part: &Part,
        scores: &HashMap<String, f64>,
        key: Option<&GradingKey>,
    ) -> GradingResult<Option<PartScore>> {
        self.validate_part(part)?;
        if !part.calculate_sub_score {
            return Ok(None);
        }

        let structural = self.rollup();
        let scored = self.rollup_scores(scores);
        let mut achieved = 0.0;
        let mut max_points = 0.0;
        for task_id in &part.task_ids {
            achieved += scored.achieved.get(task_id).copied().unwrap_or(0.0);
            max_points += structural
                .totals
                .get(task_id)
                .map(|t| t.points)
                .unwrap_or(0.0);
        }
        let percentage = (max_points > 0.0).then(|| achieved / max_points * 100.0);

        let grade = match part.score_type {
            PartScoreType::Points => None,
            PartScoreType::Grade => {
                let key = key.ok_or_else(|| {
                    GradingError::configuration(format!(
                        "part {} is graded but no grading key was supplied",
                        part.id
                    ))
                })?;
                let p = percentage.ok_or_else(|| {
                    GradingError::Division(format!("part {} has no achievable points", part.id))
                })?;
                Some(key.resolve_percentage(p)?.grade)
            }
        };

        Ok(Some(PartScore {
            part_id: part.id.clone(),
            achieved,
            max_points,
            percentage,
            grade,
        }))
    }
}

fn validate_node(node: &TaskNode) -> GradingResult<()> {
    if node.id.trim().is_empty() {
        return Err(GradingError::structure("task id must not be empty"));
    }
    if !(1..=MAX_LEVEL).contains(&node.level) {
        return Err(GradingError::structure(format!(
            "task {} has level {}, expected 1..={}",
            node.id, node.level, MAX_LEVEL
        )));
    }
    if !node.points.is_finite() || node.points < 0.0 {
        return Err(GradingError::structure(format!(
            "task {} has invalid points {}",
            node.id, node.points
        )));
    }
    if !node.bonus_points.is_finite() || node.bonus_points < 0.0 {
        return Err(GradingError::structure(format!(
            "task {} has invalid bonus points {}",
            node.id, node.bonus_points
        )));
    }
    if node.is_choice
        && node
            .choice_group
            .as_deref()
            .map(|g| g.trim().is_empty())
            .unwrap_or(true)
    {
        return Err(GradingError::structure(format!(
            "choice task {} needs a choiceGroup label",
            node.id
        )));
    }
    Ok(())
}

fn detect_cycles(nodes: &[TaskNode], index: &HashMap<String, usize>) -> GradingResult<()> {
    for start in nodes {
        let mut seen = HashSet::new();
        seen.insert(start.id.as_str());
        let mut current = start;
        while let Some(parent_id) = current.parent_id.as_deref() {
            if !seen.insert(parent_id) {
                return Err(GradingError::structure(format!(
                    "cycle detected through task {}",
                    start.id
                )));
            }
            let Some(&p) = index.get(parent_id) else {
                break;
            };
            current = &nodes[p];
        }
    }
    Ok(())
}
