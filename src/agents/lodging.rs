use std::sync::Arc;

use nanoid::nanoid;
use serde_json::{Value, json};

use crate::data_models::{LodgingResult, SearchPlan};
use crate::genai::{GenerateError, Generative, generate_as};
use crate::score::{ScoreCategory, clamp_score, score_item};

pub struct LodgingAgent {
    generator: Arc<dyn Generative>,
}

impl LodgingAgent {
    pub fn new(generator: Arc<dyn Generative>) -> LodgingAgent {
        LodgingAgent { generator }
    }

    /// Search lodging for the plan. A failed search never propagates; it logs
    /// and returns an empty list so one dead category can't sink the trip.
    pub async fn search(&self, plan: &SearchPlan, count: usize) -> Vec<LodgingResult> {
        match self.try_search(plan, count).await {
            Ok(items) => items,
            Err(e) => {
                log::error!("lodging search failed for {}: {e:#}", plan.destination);
                Vec::new()
            }
        }
    }

    async fn try_search(
        &self,
        plan: &SearchPlan,
        count: usize,
    ) -> Result<Vec<LodgingResult>, GenerateError> {
        let instruction = build_instruction(plan, count);
        let items = generate_as::<Vec<LodgingResult>>(
            self.generator.as_ref(),
            &instruction,
            lodging_schema(),
        )
        .await?;
        Ok(finalize(items, plan, count))
    }
}

fn build_instruction(plan: &SearchPlan, count: usize) -> String {
    format!(
        "Find {count} real-sounding lodging options in {destination} for {travelers} \
         traveler(s), {start} to {end} ({nights} nights).\n\
         Price band: ${min}-${max}/night. Stars: {stars_min}-{stars_max}.\n\
         Wanted amenities: {amenities}\n\
         Neighborhoods to favor: {neighborhoods}\n\
         Trip vibes: {vibes}. Lean into: {keywords}. Avoid: {avoid}\n\
         For each option give name, description, nightly price, currency, star and \
         user ratings, amenities, location with coordinates, image urls, a booking \
         url with partner name, a vibe_score from 0 to 100, and which of the trip \
         vibes it matches.",
        count = count,
        destination = plan.destination,
        travelers = plan.travelers,
        start = plan.start_date,
        end = plan.end_date,
        nights = plan.nights,
        min = plan.lodging.price_min,
        max = plan.lodging.price_max,
        stars_min = plan.lodging.stars_min,
        stars_max = plan.lodging.stars_max,
        amenities = plan.lodging.amenities.join(", "),
        neighborhoods = plan.lodging.neighborhoods.join(", "),
        vibes = plan.vibes.canonical.join(", "),
        keywords = plan.vibes.keywords.join(", "),
        avoid = plan.vibes.avoid.join(", "),
    )
}

/// Attach fresh ids, settle vibe scores, and rank. Scores the model supplied
/// are clamped into [0, 100]; a missing score is recomputed deterministically.
/// Sort is stable so ties keep input order.
fn finalize(mut items: Vec<LodgingResult>, plan: &SearchPlan, count: usize) -> Vec<LodgingResult> {
    for item in &mut items {
        item.id = nanoid!();
        if item.affiliate.partner.is_empty() {
            item.affiliate.partner = "expedia".to_string();
        }
        let text = format!(
            "{} {} {}",
            item.name,
            item.description,
            item.amenities.join(" ")
        );
        if item.vibe_score == 0 {
            let (score, matched) =
                score_item(ScoreCategory::Lodging, &text, &plan.vibes.canonical);
            item.vibe_score = score;
            item.matched_vibes = matched;
        } else {
            item.vibe_score = clamp_score(item.vibe_score);
            item.matched_vibes
                .retain(|v| plan.vibes.canonical.contains(v));
        }
    }
    items.sort_by(|a, b| b.vibe_score.cmp(&a.vibe_score));
    items.truncate(count);
    items
}

fn lodging_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "name": { "type": "STRING" },
                "description": { "type": "STRING" },
                "price_per_night": { "type": "NUMBER" },
                "currency": { "type": "STRING" },
                "star_rating": { "type": "NUMBER" },
                "user_rating": { "type": "NUMBER" },
                "amenities": { "type": "ARRAY", "items": { "type": "STRING" } },
                "location": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "address": { "type": "STRING" },
                        "lat": { "type": "NUMBER" },
                        "lng": { "type": "NUMBER" },
                        "neighborhood": { "type": "STRING" }
                    }
                },
                "images": { "type": "ARRAY", "items": { "type": "STRING" } },
                "affiliate": {
                    "type": "OBJECT",
                    "properties": {
                        "url": { "type": "STRING" },
                        "partner": { "type": "STRING" }
                    }
                },
                "vibe_score": { "type": "INTEGER" },
                "matched_vibes": { "type": "ARRAY", "items": { "type": "STRING" } }
            },
            "required": ["name"]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_models::{BudgetTier, VibeInterpretation};
    use chrono::NaiveDate;

    fn test_plan() -> SearchPlan {
        SearchPlan {
            destination: "Lisbon".to_string(),
            country: Some("Portugal".to_string()),
            start_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
            nights: 3,
            travelers: 2,
            traveler_type: None,
            budget: BudgetTier::Moderate,
            search_priorities: vec![],
            lodging: Default::default(),
            activity: Default::default(),
            dining: Default::default(),
            vibes: VibeInterpretation {
                canonical: vec!["romantic".to_string()],
                keywords: vec!["boutique".to_string()],
                avoid: vec![],
            },
        }
    }

    fn item(name: &str, score: i64) -> LodgingResult {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "vibe_score": score,
        }))
        .unwrap()
    }

    #[test]
    fn finalize_assigns_unique_ids_and_ranks_descending() {
        let plan = test_plan();
        let items = finalize(
            vec![item("A", 40), item("B", 90), item("C", 70)],
            &plan,
            10,
        );
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["B", "C", "A"]);
        assert!(items.iter().all(|i| !i.id.is_empty()));
        assert_ne!(items[0].id, items[1].id);
    }

    #[test]
    fn finalize_clamps_out_of_range_scores() {
        let plan = test_plan();
        let items = finalize(vec![item("A", 400)], &plan, 10);
        assert_eq!(items[0].vibe_score, 100);
    }

    #[test]
    fn finalize_recomputes_missing_scores() {
        let plan = test_plan();
        let mut raw = item("Boutique loft", 0);
        raw.description = "intimate boutique stay".to_string();
        let items = finalize(vec![raw], &plan, 10);
        // 50 base + 10 keyword + 20 romantic/boutique bonus
        assert_eq!(items[0].vibe_score, 80);
        assert_eq!(items[0].matched_vibes, vec!["romantic".to_string()]);
    }

    #[test]
    fn finalize_keeps_input_order_on_ties() {
        let plan = test_plan();
        let items = finalize(
            vec![item("first", 60), item("second", 60), item("third", 60)],
            &plan,
            10,
        );
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["first", "second", "third"]);
    }

    #[test]
    fn finalize_truncates_to_requested_count() {
        let plan = test_plan();
        let items = finalize(
            vec![item("a", 10), item("b", 90), item("c", 50), item("d", 70)],
            &plan,
            2,
        );
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "b");
        assert_eq!(items[1].name, "d");
    }
}
