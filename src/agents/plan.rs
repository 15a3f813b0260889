use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};

use crate::data_models::{
    ActivityCriteria, DiningCriteria, LodgingCriteria, SearchInput, SearchPlan,
    VibeInterpretation,
};
use crate::genai::{Generative, generate_as};
use crate::reference::{budget_range, keywords_for_vibes};

/// The model-judged half of a plan. Everything date/traveler/budget-shaped is
/// computed from the input instead, so a flaky generation can never corrupt it.
#[derive(Deserialize, Debug, Default)]
pub struct PlanDetails {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub search_priorities: Vec<String>,
    #[serde(default)]
    pub lodging: LodgingCriteria,
    #[serde(default)]
    pub activity: ActivityCriteria,
    #[serde(default)]
    pub dining: DiningCriteria,
    #[serde(default)]
    pub vibes: VibeInterpretation,
}

pub struct PlanAgent {
    generator: Arc<dyn Generative>,
}

impl PlanAgent {
    pub fn new(generator: Arc<dyn Generative>) -> PlanAgent {
        PlanAgent { generator }
    }

    /// Derive the shared search plan. Never fails: any generation problem is
    /// logged and replaced by the deterministic table-driven plan.
    pub async fn derive(&self, input: &SearchInput) -> SearchPlan {
        let instruction = self.build_instruction(input);
        let details = match generate_as::<PlanDetails>(
            self.generator.as_ref(),
            &instruction,
            plan_schema(),
        )
        .await
        {
            Ok(details) => details,
            Err(e) => {
                log::warn!("plan derivation failed, using deterministic plan: {e:#}");
                fallback_details(input)
            }
        };

        build_plan(input, details)
    }

    fn build_instruction(&self, input: &SearchInput) -> String {
        let range = budget_range(input.budget);
        let traveler_type = input
            .traveler_type
            .map(|t| format!("{t:?}").to_lowercase())
            .unwrap_or_else(|| "unspecified".to_string());

        format!(
            "You are a travel search planner. Turn this trip request into structured \
             search criteria.\n\
             Destination: {destination}\n\
             Dates: {start} to {end} ({nights} nights)\n\
             Travelers: {travelers} ({traveler_type})\n\
             Vibes: {vibes}\n\
             Budget tier: {budget:?} (roughly ${min}-${max} per night lodging, \
             {dining_tier} dining)\n\
             Produce: the destination country, an ordered list of search priorities, \
             lodging criteria (price band within the stated range, target star band, \
             amenities, promising neighborhoods), activity criteria (categories, pace, \
             must-see list, interests), dining criteria (cuisines, price tier, dietary \
             needs, meal priorities), and a vibe interpretation (canonical vibes, \
             positive search keywords, keywords to avoid).",
            destination = input.destination,
            start = input.start_date,
            end = input.end_date,
            nights = input.nights(),
            travelers = input.travelers,
            traveler_type = traveler_type,
            vibes = input.vibes.join(", "),
            budget = input.budget,
            min = range.nightly_min,
            max = range.nightly_max,
            dining_tier = range.dining_price_tier,
        )
    }
}

/// Deterministic plan details straight from the reference tables, used when the
/// generative call fails.
pub fn fallback_details(input: &SearchInput) -> PlanDetails {
    let range = budget_range(input.budget);
    let keywords = keywords_for_vibes(&input.vibes);
    let interests: Vec<String> = keywords.iter().take(10).cloned().collect();

    PlanDetails {
        country: None,
        search_priorities: vec![
            "lodging".to_string(),
            "activity".to_string(),
            "dining".to_string(),
        ],
        lodging: LodgingCriteria {
            price_min: range.nightly_min,
            price_max: range.nightly_max,
            stars_min: range.stars_min,
            stars_max: range.stars_max,
            amenities: Vec::new(),
            neighborhoods: Vec::new(),
        },
        activity: ActivityCriteria {
            categories: Vec::new(),
            pace: "moderate".to_string(),
            must_see: Vec::new(),
            interests: interests.clone(),
        },
        dining: DiningCriteria {
            cuisines: Vec::new(),
            price_tier: range.dining_price_tier.to_string(),
            dietary: Vec::new(),
            meal_priorities: Vec::new(),
        },
        vibes: VibeInterpretation {
            canonical: input.vibes.clone(),
            keywords,
            avoid: Vec::new(),
        },
    }
}

fn build_plan(input: &SearchInput, mut details: PlanDetails) -> SearchPlan {
    // Backstops for a model response that left gaps.
    if details.search_priorities.is_empty() {
        details.search_priorities = vec![
            "lodging".to_string(),
            "activity".to_string(),
            "dining".to_string(),
        ];
    }
    if details.vibes.canonical.is_empty() {
        details.vibes.canonical = input.vibes.clone();
    }
    if details.vibes.keywords.is_empty() {
        details.vibes.keywords = keywords_for_vibes(&input.vibes);
    }
    if details.activity.pace.is_empty() {
        details.activity.pace = "moderate".to_string();
    }
    if details.lodging.price_max == 0 {
        let range = budget_range(input.budget);
        details.lodging.price_min = range.nightly_min;
        details.lodging.price_max = range.nightly_max;
        details.lodging.stars_min = range.stars_min;
        details.lodging.stars_max = range.stars_max;
    }

    SearchPlan {
        destination: input.destination.clone(),
        country: details.country,
        start_date: input.start_date,
        end_date: input.end_date,
        nights: input.nights(),
        travelers: input.travelers,
        traveler_type: input.traveler_type,
        budget: input.budget,
        search_priorities: details.search_priorities,
        lodging: details.lodging,
        activity: details.activity,
        dining: details.dining,
        vibes: details.vibes,
    }
}

fn plan_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "country": { "type": "STRING" },
            "search_priorities": { "type": "ARRAY", "items": { "type": "STRING" } },
            "lodging": {
                "type": "OBJECT",
                "properties": {
                    "price_min": { "type": "INTEGER" },
                    "price_max": { "type": "INTEGER" },
                    "stars_min": { "type": "INTEGER" },
                    "stars_max": { "type": "INTEGER" },
                    "amenities": { "type": "ARRAY", "items": { "type": "STRING" } },
                    "neighborhoods": { "type": "ARRAY", "items": { "type": "STRING" } }
                }
            },
            "activity": {
                "type": "OBJECT",
                "properties": {
                    "categories": { "type": "ARRAY", "items": { "type": "STRING" } },
                    "pace": { "type": "STRING" },
                    "must_see": { "type": "ARRAY", "items": { "type": "STRING" } },
                    "interests": { "type": "ARRAY", "items": { "type": "STRING" } }
                }
            },
            "dining": {
                "type": "OBJECT",
                "properties": {
                    "cuisines": { "type": "ARRAY", "items": { "type": "STRING" } },
                    "price_tier": { "type": "STRING" },
                    "dietary": { "type": "ARRAY", "items": { "type": "STRING" } },
                    "meal_priorities": { "type": "ARRAY", "items": { "type": "STRING" } }
                }
            },
            "vibes": {
                "type": "OBJECT",
                "properties": {
                    "canonical": { "type": "ARRAY", "items": { "type": "STRING" } },
                    "keywords": { "type": "ARRAY", "items": { "type": "STRING" } },
                    "avoid": { "type": "ARRAY", "items": { "type": "STRING" } }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_models::{BudgetTier, TravelerType};
    use chrono::NaiveDate;

    fn lisbon_input() -> SearchInput {
        SearchInput {
            destination: "Lisbon".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
            travelers: 2,
            traveler_type: Some(TravelerType::Couple),
            vibes: vec!["foodie".to_string(), "cultural".to_string()],
            budget: BudgetTier::Moderate,
        }
    }

    #[test]
    fn fallback_details_follow_the_tables() {
        let input = lisbon_input();
        let details = fallback_details(&input);

        assert_eq!(details.lodging.price_min, 90);
        assert_eq!(details.lodging.price_max, 250);
        assert_eq!(details.lodging.stars_min, 3);
        assert_eq!(details.lodging.stars_max, 4);
        assert_eq!(details.activity.pace, "moderate");
        assert!(details.activity.interests.len() <= 10);
        assert!(!details.activity.interests.is_empty());
        assert!(details.vibes.avoid.is_empty());
        assert_eq!(details.vibes.canonical, input.vibes);
    }

    #[test]
    fn built_plan_always_carries_input_dates_and_nights() {
        let input = lisbon_input();
        let plan = build_plan(&input, PlanDetails::default());

        assert_eq!(plan.nights, 3);
        assert_eq!(plan.start_date, input.start_date);
        assert_eq!(plan.end_date, input.end_date);
        assert_eq!(plan.destination, "Lisbon");
        // gaps in an empty details block get backstopped
        assert_eq!(plan.activity.pace, "moderate");
        assert_eq!(plan.vibes.canonical, input.vibes);
        assert!(plan.lodging.price_max > 0);
    }
}
