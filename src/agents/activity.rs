use std::sync::Arc;

use nanoid::nanoid;
use serde_json::{Value, json};

use crate::data_models::{ActivityResult, SearchPlan};
use crate::genai::{GenerateError, Generative, generate_as};
use crate::score::{ScoreCategory, clamp_score, score_item};

pub struct ActivityAgent {
    generator: Arc<dyn Generative>,
}

impl ActivityAgent {
    pub fn new(generator: Arc<dyn Generative>) -> ActivityAgent {
        ActivityAgent { generator }
    }

    /// Search activities for the plan. Errors are absorbed into an empty list.
    pub async fn search(&self, plan: &SearchPlan, count: usize) -> Vec<ActivityResult> {
        match self.try_search(plan, count).await {
            Ok(items) => items,
            Err(e) => {
                log::error!("activity search failed for {}: {e:#}", plan.destination);
                Vec::new()
            }
        }
    }

    async fn try_search(
        &self,
        plan: &SearchPlan,
        count: usize,
    ) -> Result<Vec<ActivityResult>, GenerateError> {
        let instruction = build_instruction(plan, count);
        let items = generate_as::<Vec<ActivityResult>>(
            self.generator.as_ref(),
            &instruction,
            activity_schema(),
        )
        .await?;
        Ok(finalize(items, plan, count))
    }
}

fn build_instruction(plan: &SearchPlan, count: usize) -> String {
    format!(
        "Find {count} activities and experiences in {destination} for a {nights}-night \
         trip, {start} to {end}, pace: {pace}.\n\
         Categories to cover: {categories}\n\
         Must see: {must_see}\n\
         Traveler interests: {interests}\n\
         Trip vibes: {vibes}. Lean into: {keywords}. Avoid: {avoid}\n\
         For each activity give name, description, category, price per person, \
         currency, duration in hours, rating, the best time of day (morning, \
         afternoon, evening, or any), location with coordinates, image urls, a \
         booking url with partner name, a vibe_score from 0 to 100, and which trip \
         vibes it matches.",
        count = count,
        destination = plan.destination,
        nights = plan.nights,
        start = plan.start_date,
        end = plan.end_date,
        pace = plan.activity.pace,
        categories = plan.activity.categories.join(", "),
        must_see = plan.activity.must_see.join(", "),
        interests = plan.activity.interests.join(", "),
        vibes = plan.vibes.canonical.join(", "),
        keywords = plan.vibes.keywords.join(", "),
        avoid = plan.vibes.avoid.join(", "),
    )
}

fn finalize(
    mut items: Vec<ActivityResult>,
    plan: &SearchPlan,
    count: usize,
) -> Vec<ActivityResult> {
    for item in &mut items {
        item.id = nanoid!();
        if item.affiliate.partner.is_empty() {
            item.affiliate.partner = "viator".to_string();
        }
        let text = format!("{} {} {}", item.name, item.description, item.category);
        if item.vibe_score == 0 {
            let (score, matched) =
                score_item(ScoreCategory::Activity, &text, &plan.vibes.canonical);
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

fn activity_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "name": { "type": "STRING" },
                "description": { "type": "STRING" },
                "category": { "type": "STRING" },
                "price": { "type": "NUMBER" },
                "currency": { "type": "STRING" },
                "duration_hours": { "type": "NUMBER" },
                "rating": { "type": "NUMBER" },
                "best_time": {
                    "type": "STRING",
                    "enum": ["morning", "afternoon", "evening", "any"]
                },
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
    use crate::data_models::{BudgetTier, TimeOfDay, VibeInterpretation};
    use chrono::NaiveDate;

    fn test_plan() -> SearchPlan {
        SearchPlan {
            destination: "Lisbon".to_string(),
            country: None,
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
                canonical: vec!["cultural".to_string()],
                keywords: vec!["museum".to_string()],
                avoid: vec![],
            },
        }
    }

    #[test]
    fn unscored_activity_starts_from_zero_base() {
        let plan = test_plan();
        let raw: ActivityResult = serde_json::from_value(serde_json::json!({
            "name": "Tile museum visit",
            "description": "heritage collection",
        }))
        .unwrap();
        let items = finalize(vec![raw], &plan, 10);
        // 0 base + 10 keyword match ("museum"/"heritage")
        assert_eq!(items[0].vibe_score, 10);
        assert_eq!(items[0].matched_vibes, vec!["cultural".to_string()]);
    }

    #[test]
    fn best_time_defaults_to_any_when_model_omits_it() {
        let raw: ActivityResult =
            serde_json::from_value(serde_json::json!({ "name": "Harbor walk" })).unwrap();
        assert_eq!(raw.best_time, TimeOfDay::Any);
    }

    #[test]
    fn foreign_matched_vibes_are_dropped() {
        let plan = test_plan();
        let raw: ActivityResult = serde_json::from_value(serde_json::json!({
            "name": "Night market",
            "vibe_score": 55,
            "matched_vibes": ["cultural", "spooky"],
        }))
        .unwrap();
        let items = finalize(vec![raw], &plan, 10);
        assert_eq!(items[0].matched_vibes, vec!["cultural".to_string()]);
    }
}
