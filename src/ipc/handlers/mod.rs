pub mod alternative;
pub mod core;
pub mod corrections;
pub mod criteria;
pub mod exams;
pub mod grading_keys;
pub mod lookup;
pub mod setup;
