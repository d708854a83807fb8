//! Confidence scoring table for resolved parameters (C6 step 4).

pub const EXACT_MATCH: &str = "exact_match";
pub const FUZZY_MATCH: &str = "fuzzy_match";
pub const LLM_VALIDATED: &str = "llm_validated";
pub const DEFAULT_VALUE: &str = "default_value";
pub const DEFAULT_POLICY: &str = "default_policy";
pub const LLM_UNVALIDATED: &str = "llm_unvalidated";
pub const LLM_FAILED_VALIDATION: &str = "llm_failed_validation";

/// `score(method, weight)`. Floored methods clamp the weighted score up
/// to their floor; LLM methods have no floor and scale linearly with
/// `weight` (the parameter's `confidence_weight`, default 1.0).
pub fn score(method: &str, weight: f64) -> f64 {
    let (base, floor) = match method {
        EXACT_MATCH => (1.00, Some(0.85)),
        FUZZY_MATCH => (0.85, Some(0.60)),
        LLM_VALIDATED => (0.75, None),
        DEFAULT_VALUE => (0.70, Some(0.60)),
        DEFAULT_POLICY => (0.70, Some(0.60)),
        LLM_UNVALIDATED => (0.65, None),
        LLM_FAILED_VALIDATION => (0.30, None),
        _ => (0.50, None),
    };

    let weighted = base * weight;
    match floor {
        Some(f) => weighted.max(f),
        None => weighted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_floor_protects_low_weight() {
        assert_eq!(score(EXACT_MATCH, 0.5), 0.85);
    }

    #[test]
    fn exact_match_full_weight_is_one() {
        assert_eq!(score(EXACT_MATCH, 1.0), 1.0);
    }

    #[test]
    fn llm_methods_have_no_floor() {
        assert_eq!(score(LLM_FAILED_VALIDATION, 0.2), 0.06);
    }
}
