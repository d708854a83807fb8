//! Follow-up suggestions (C9 response enrichment): canned per-area
//! prompts, rotated by how many turns deep the user is into an area.

use once_cell::sync::Lazy;

use crate::models::Suggestion;

const CROSS_AREA_DEPTH_THRESHOLD: u32 = 3;

fn s(title: &str, prompt: &str) -> Suggestion {
    Suggestion { title: title.to_string(), prompt: prompt.to_string() }
}

static SCHEMA_SUGGESTIONS: Lazy<Vec<(&'static str, Vec<Suggestion>)>> = Lazy::new(|| {
    vec![
        (
            "sales",
            vec![
                s("Order trends", "Show me order trends over the last 6 months"),
                s("Invoice details", "Drill into invoice line items for the most recent orders"),
                s("Customer categories", "Compare total revenue across customer buying groups"),
                s("Special deals", "Show active special deals and their discount percentages"),
            ],
        ),
        (
            "purchasing",
            vec![
                s("PO status", "Track purchase order status and expected delivery dates"),
                s("Supplier performance", "Analyze supplier categories and order volumes"),
                s("Supplier transactions", "Review recent supplier transaction history"),
            ],
        ),
        (
            "warehouse",
            vec![
                s("Stock levels", "Check current stock levels and holdings across warehouses"),
                s("Stock categories", "Explore stock groups and item categories"),
                s("Stock transactions", "Review stock transaction history for the last 30 days"),
                s("Package types", "Analyze color and package type distributions for stock items"),
            ],
        ),
        (
            "application",
            vec![
                s("People & contacts", "Look up people, their roles, and contact information"),
                s("Geographic data", "Explore cities, states, and countries in the system"),
                s("Delivery methods", "Review available delivery and payment methods"),
            ],
        ),
    ]
});

fn area_suggestions(area: &str) -> Option<&'static [Suggestion]> {
    SCHEMA_SUGGESTIONS.iter().find(|(a, _)| *a == area).map(|(_, s)| s.as_slice())
}

/// Selects 2-3 follow-up suggestions for the given schema area and
/// exploration depth. `depth` is the session's `exploration_depth`
/// counter, which is 0 on the first query in an area (not 1) — treated
/// here as depth 1 for rotation purposes so the first turn in any area
/// always starts from the top of its suggestion list.
pub fn build_suggestions(schema_area: Option<&str>, depth: u32, has_results: bool) -> Vec<Suggestion> {
    let Some(area) = schema_area else { return Vec::new() };
    let Some(area_list) = area_suggestions(area) else { return Vec::new() };
    if area_list.is_empty() {
        return Vec::new();
    }

    let effective_depth = depth.max(1);
    let count = area_list.len();
    let start = ((effective_depth - 1) as usize) % count;
    let rotated: Vec<Suggestion> = area_list[start..].iter().chain(area_list[..start].iter()).cloned().collect();
    let mut selected: Vec<Suggestion> = rotated.into_iter().take(3).collect();

    if effective_depth >= CROSS_AREA_DEPTH_THRESHOLD {
        let mut areas: Vec<&str> = SCHEMA_SUGGESTIONS.iter().map(|(a, _)| *a).collect();
        areas.sort_unstable();
        if let Some(idx) = areas.iter().position(|a| *a == area) {
            let next_area = areas[(idx + 1) % areas.len()];
            if let Some(next_list) = area_suggestions(next_area) {
                if let Some(cross) = next_list.first() {
                    selected.truncate(2);
                    selected.push(cross.clone());
                }
            }
        }
    }

    if !has_results {
        let recovery = s("Try broader filters", &format!("Show me all data in the {area} area"));
        selected.truncate(2);
        selected.insert(0, recovery);
    }

    selected
}
