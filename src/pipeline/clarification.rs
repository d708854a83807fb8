//! Clarification construction (C8): turns a draft's missing-parameter
//! list into a single round-trip question.
//!
//! Deliberately asks about only the first missing parameter — a draft
//! can have several, but resolving one at a time keeps the user-facing
//! exchange short and keeps resumption (re-entering at validation, not
//! extraction) simple.

use crate::models::{ClarificationRequest, SqlDraft};

fn prompt_for(mp: &crate::models::MissingParameter, fallback: &Option<String>) -> (String, Vec<String>) {
    let allowed_values = mp.alternatives.clone().unwrap_or_default();

    let prompt = match &mp.best_guess {
        Some(guess) => {
            let alternatives: Vec<String> = allowed_values
                .iter()
                .filter(|v| *v != guess)
                .take(2)
                .map(|v| format!("**{v}**"))
                .collect();
            if alternatives.is_empty() {
                format!("It looks like you want **{guess}** for {}. Is that correct?", mp.name)
            } else {
                format!(
                    "It looks like you want **{guess}** for {}. Is that correct, or did you mean {}?",
                    mp.name,
                    alternatives.join(" or ")
                )
            }
        }
        None if !allowed_values.is_empty() => {
            format!("What value would you like for {}? Options: {}", mp.name, allowed_values.join(", "))
        }
        None => fallback
            .clone()
            .unwrap_or_else(|| format!("Could you provide a value for {}?", mp.name)),
    };

    (prompt, allowed_values)
}

/// Builds the clarification request for a draft whose status is
/// `NeedsClarification`. Carries `template_id`/`template_json`/
/// `extracted_parameters` forward so the next turn can resume extraction
/// with everything already resolved so far preserved.
pub fn build_clarification(draft: &SqlDraft) -> ClarificationRequest {
    let (parameter_name, prompt, allowed_values) = match draft.missing_parameters.first() {
        Some(mp) => {
            let (prompt, allowed_values) = prompt_for(mp, &draft.clarification_prompt);
            (mp.name.clone(), prompt, allowed_values)
        }
        None => (
            String::new(),
            draft
                .clarification_prompt
                .clone()
                .unwrap_or_else(|| "Could you clarify your request?".to_string()),
            Vec::new(),
        ),
    };

    ClarificationRequest {
        parameter_name,
        prompt,
        allowed_values,
        original_question: draft.user_query.clone(),
        template_id: draft.template_id.clone().unwrap_or_default(),
        template_json: draft.template_json.clone().unwrap_or_default(),
        extracted_parameters: draft.extracted_parameters.clone(),
    }
}
