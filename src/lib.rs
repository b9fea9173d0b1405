//! Grading engine: task structures, grading keys, lookup tables, alternative
//! symbol scales, criteria aggregation and the correction state machine.
//!
//! Everything here is pure computation over caller-owned data. Persistence and
//! transport live outside the library (see the `gradingd` binary).

pub mod alternative;
pub mod correction;
pub mod criteria;
pub mod error;
pub mod grading_key;
pub mod lookup;
pub mod presets;
pub mod rounding;
pub mod statistics;
pub mod task_tree;

pub use alternative::{to_points, to_symbol, weighted_average, AlternativeScale, ScaleEntry};
pub use correction::{CorrectionEntry, CorrectionRecorder, CorrectionStatus, TaskScore};
pub use criteria::{aggregate, CriteriaResult, CriterionConfig};
pub use error::{GradingError, GradingResult};
pub use grading_key::{GradeBoundary, GradeResolution, GradingKey, GradingKeyType};
pub use lookup::{lookup, lookup_points, ContextValue, DimensionMatcher, LookupTable, LookupValue};
pub use rounding::{RoundingMode, RoundingRule};
pub use statistics::{summarize, CorrectionSummary};
pub use task_tree::{Part, PartScore, Rollup, ScoredRollup, TaskNode, TaskTree};
