//! Parameter (C2) and query (C3) validation stages.

pub mod parameter_validator;
pub mod query_validator;

pub use parameter_validator::{validate_all_parameters, validate_parameters, validate_single};
pub use query_validator::validate_query;
