//! Pure, dependency-free helpers shared across the pipeline stages.

pub mod column_refine;
pub mod error_recovery;
pub mod substitution;

pub use column_refine::{refine_columns, ColumnRefinementResult, DEFAULT_MAX_DISPLAY_COLUMNS};
pub use error_recovery::{build_error_recovery, classify_violations, detect_area_from_tables, ViolationCategory};
pub use substitution::{substitute_parameters, ParameterizedQuery};
