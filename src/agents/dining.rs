use std::sync::Arc;

use nanoid::nanoid;
use serde_json::{Value, json};

use crate::data_models::{DiningResult, SearchPlan};
use crate::genai::{GenerateError, Generative, generate_as};
use crate::score::{ScoreCategory, clamp_score, score_item};

pub struct DiningAgent {
    generator: Arc<dyn Generative>,
}

impl DiningAgent {
    pub fn new(generator: Arc<dyn Generative>) -> DiningAgent {
        DiningAgent { generator }
    }

    /// Search dining for the plan. Errors are absorbed into an empty list.
    pub async fn search(&self, plan: &SearchPlan, count: usize) -> Vec<DiningResult> {
        match self.try_search(plan, count).await {
            Ok(items) => items,
            Err(e) => {
                log::error!("dining search failed for {}: {e:#}", plan.destination);
                Vec::new()
            }
        }
    }

    async fn try_search(
        &self,
        plan: &SearchPlan,
        count: usize,
    ) -> Result<Vec<DiningResult>, GenerateError> {
        let instruction = build_instruction(plan, count);
        let items = generate_as::<Vec<DiningResult>>(
            self.generator.as_ref(),
            &instruction,
            dining_schema(),
        )
        .await?;
        Ok(finalize(items, plan, count))
    }
}

fn build_instruction(plan: &SearchPlan, count: usize) -> String {
    format!(
        "Find {count} places to eat in {destination} for a {nights}-night trip, \
         {start} to {end}.\n\
         Cuisines: {cuisines}. Price tier: {price_tier}.\n\
         Dietary needs: {dietary}\n\
         Meal priorities: {meal_priorities}\n\
         Trip vibes: {vibes}. Lean into: {keywords}. Avoid: {avoid}\n\
         For each place give name, description, cuisine, price_level (1-4), which \
         meals it suits (breakfast, lunch, dinner), rating, location with \
         coordinates, image urls, a reservation url with partner name, a vibe_score \
         from 0 to 100, and which trip vibes it matches.",
        count = count,
        destination = plan.destination,
        nights = plan.nights,
        start = plan.start_date,
        end = plan.end_date,
        cuisines = plan.dining.cuisines.join(", "),
        price_tier = plan.dining.price_tier,
        dietary = plan.dining.dietary.join(", "),
        meal_priorities = plan.dining.meal_priorities.join(", "),
        vibes = plan.vibes.canonical.join(", "),
        keywords = plan.vibes.keywords.join(", "),
        avoid = plan.vibes.avoid.join(", "),
    )
}

fn finalize(mut items: Vec<DiningResult>, plan: &SearchPlan, count: usize) -> Vec<DiningResult> {
    for item in &mut items {
        item.id = nanoid!();
        item.price_level = item.price_level.clamp(1, 4);
        if item.affiliate.partner.is_empty() {
            item.affiliate.partner = "opentable".to_string();
        }
        let text = format!("{} {} {}", item.name, item.description, item.cuisine);
        if item.vibe_score == 0 {
            let (score, matched) =
                score_item(ScoreCategory::Dining, &text, &plan.vibes.canonical);
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

fn dining_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "name": { "type": "STRING" },
                "description": { "type": "STRING" },
                "cuisine": { "type": "STRING" },
                "price_level": { "type": "INTEGER" },
                "meal_types": {
                    "type": "ARRAY",
                    "items": {
                        "type": "STRING",
                        "enum": ["breakfast", "lunch", "dinner"]
                    }
                },
                "rating": { "type": "NUMBER" },
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
    use crate::data_models::{BudgetTier, MealType, VibeInterpretation};
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
                canonical: vec!["foodie".to_string()],
                keywords: vec!["tasting".to_string()],
                avoid: vec![],
            },
        }
    }

    #[test]
    fn price_level_is_clamped_into_band() {
        let plan = test_plan();
        let low: DiningResult = serde_json::from_value(serde_json::json!({
            "name": "Cart", "price_level": 0,
        }))
        .unwrap();
        let high: DiningResult = serde_json::from_value(serde_json::json!({
            "name": "Palace", "price_level": 9,
        }))
        .unwrap();
        let items = finalize(vec![low, high], &plan, 10);
        assert!(items.iter().all(|i| (1..=4).contains(&i.price_level)));
    }

    #[test]
    fn meal_types_deserialize_from_lowercase() {
        let raw: DiningResult = serde_json::from_value(serde_json::json!({
            "name": "Café Central",
            "meal_types": ["breakfast", "lunch"],
        }))
        .unwrap();
        assert_eq!(raw.meal_types, vec![MealType::Breakfast, MealType::Lunch]);
    }

    #[test]
    fn foodie_chef_bonus_applies_to_recomputed_scores() {
        let plan = test_plan();
        let raw: DiningResult = serde_json::from_value(serde_json::json!({
            "name": "Chef's tasting counter",
            "description": "eight-course tasting menu",
        }))
        .unwrap();
        let items = finalize(vec![raw], &plan, 10);
        // 50 base + 10 keyword + 20 foodie/tasting bonus
        assert_eq!(items[0].vibe_score, 80);
    }
}
