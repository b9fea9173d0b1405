//! Table-driven lookup for standardized measurements (fitness tests and the like).
//!
//! Entries are checked in stored order and the first entry whose every key
//! dimension matches wins. There is no "closest match": a context that no
//! entry covers is a `NoMatch` error, because it means the standards table is
//! incomplete.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{GradingError, GradingResult};

/// How one key dimension of an entry is matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, from = "RawMatcher")]
pub enum DimensionMatcher {
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Exact(ContextValue),
}

/// Wire form. Range objects with unknown fields fail instead of being read
/// as an unbounded range.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawMatcher {
    Range(RawRange),
    Exact(ContextValue),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRange {
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
}

impl From<RawMatcher> for DimensionMatcher {
    fn from(raw: RawMatcher) -> Self {
        match raw {
            RawMatcher::Range(RawRange { min, max }) => Self::Range { min, max },
            RawMatcher::Exact(value) => Self::Exact(value),
        }
    }
}

impl DimensionMatcher {
    pub fn exact(value: impl Into<ContextValue>) -> Self {
        Self::Exact(value.into())
    }

    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Self::Range { min, max }
    }

    pub fn kind(&self) -> TableDimensionKind {
        match self {
            Self::Range { .. } => TableDimensionKind::Range,
            Self::Exact(_) => TableDimensionKind::Exact,
        }
    }

    fn matches(&self, value: &ContextValue) -> bool {
        match self {
            Self::Exact(expected) => expected.normalized() == value.normalized(),
            Self::Range { min, max } => {
                let Some(v) = value.as_number() else {
                    return false;
                };
                min.map(|m| v >= m).unwrap_or(true) && max.map(|m| v <= m).unwrap_or(true)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableDimensionKind {
    Exact,
    Range,
}

/// A measured or categorical value supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Number(f64),
    Text(String),
}

impl ContextValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n).filter(|n| n.is_finite()),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }

    /// Trimmed, ASCII-lowercased string form; integral numbers drop `.0`.
    fn normalized(&self) -> String {
        match self {
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_ascii_lowercase(),
        }
    }
}

impl From<f64> for ContextValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for ContextValue {
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<&str> for ContextValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Output of a matched entry: a grade label or a number of points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LookupValue {
    Points(f64),
    Grade(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableEntry {
    pub key: BTreeMap<String, DimensionMatcher>,
    pub value: LookupValue,
}

impl TableEntry {
    pub fn new(value: LookupValue) -> Self {
        Self {
            key: BTreeMap::new(),
            value,
        }
    }

    pub fn with(mut self, dimension: impl Into<String>, matcher: DimensionMatcher) -> Self {
        self.key.insert(dimension.into(), matcher);
        self
    }

    fn matches(&self, context: &HashMap<String, ContextValue>) -> bool {
        self.key.iter().all(|(dim, matcher)| {
            context
                .get(dim)
                .map(|value| matcher.matches(value))
                .unwrap_or(false)
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLookupTable {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    entries: Vec<TableEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawLookupTable")]
pub struct LookupTable {
    pub id: String,
    pub name: String,
    entries: Vec<TableEntry>,
}

impl TryFrom<RawLookupTable> for LookupTable {
    type Error = GradingError;

    fn try_from(raw: RawLookupTable) -> Result<Self, Self::Error> {
        LookupTable::new(raw.id, raw.name, raw.entries)
    }
}

impl LookupTable {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        entries: Vec<TableEntry>,
    ) -> GradingResult<Self> {
        let id = id.into();
        for (idx, entry) in entries.iter().enumerate() {
            for (dim, matcher) in &entry.key {
                let DimensionMatcher::Range { min, max } = matcher else {
                    continue;
                };
                if min.is_none() && max.is_none() {
                    return Err(GradingError::configuration(format!(
                        "table {} entry {} dimension {}: range needs min or max",
                        id, idx, dim
                    )));
                }
                if min.map(|v| !v.is_finite()).unwrap_or(false)
                    || max.map(|v| !v.is_finite()).unwrap_or(false)
                {
                    return Err(GradingError::configuration(format!(
                        "table {} entry {} dimension {}: bounds must be finite",
                        id, idx, dim
                    )));
                }
                if let (Some(lo), Some(hi)) = (min, max) {
                    if lo > hi {
                        return Err(GradingError::configuration(format!(
                            "table {} entry {} dimension {}: min > max",
                            id, idx, dim
                        )));
                    }
                }
            }
        }
        Ok(Self {
            id,
            name: name.into(),
            entries,
        })
    }

    pub fn entries(&self) -> &[TableEntry] {
        &self.entries
    }

    /// Every dimension any entry keys on.
    pub fn dimensions(&self) -> BTreeSet<&str> {
        self.entries
            .iter()
            .flat_map(|e| e.key.keys().map(String::as_str))
            .collect()
    }
}

/// Resolves `context` to the value of the first fully matching entry.
///
/// An entry keyed on a dimension the context lacks does not match; it is
/// never treated as a wildcard.
pub fn lookup<'t>(
    table: &'t LookupTable,
    context: &HashMap<String, ContextValue>,
) -> GradingResult<&'t LookupValue> {
    table
        .entries
        .iter()
        .find(|entry| entry.matches(context))
        .map(|entry| &entry.value)
        .ok_or_else(|| GradingError::NoMatch {
            table_id: table.id.clone(),
        })
}

/// Like [`lookup`] for tables whose values are points (e.g. fitness tables
/// feeding a grading key).
pub fn lookup_points(
    table: &LookupTable,
    context: &HashMap<String, ContextValue>,
) -> GradingResult<f64> {
    match lookup(table, context)? {
        LookupValue::Points(p) => Ok(*p),
        LookupValue::Grade(g) => g.trim().parse::<f64>().map_err(|_| {
            GradingError::configuration(format!(
                "table {} returned grade '{}' where points were expected",
                table.id, g
            ))
        }),
    }
}
