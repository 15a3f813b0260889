use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::data_models::{
    ActivityResult, DayBlock, DiningResult, LodgingResult, MealType, SearchPlan, SuggestedDay,
    TimeOfDay,
};
use crate::genai::{GenerateError, Generative, generate_as};

/// How many top-ranked items per category get summarized for the model.
const TOP_N: usize = 8;

/// Operational tips attached to every deterministically composed day.
const FALLBACK_TIPS: [&str; 2] = [
    "Book popular activities a day ahead to skip the lines.",
    "Carry a light layer; evenings can cool down fast.",
];

pub struct AggregatedItinerary {
    pub days: Vec<SuggestedDay>,
    pub chosen_lodging: Option<LodgingResult>,
    /// True when the days came from the deterministic composer.
    pub degraded: bool,
}

pub struct AggregateAgent {
    generator: Arc<dyn Generative>,
}

impl AggregateAgent {
    pub fn new(generator: Arc<dyn Generative>) -> AggregateAgent {
        AggregateAgent { generator }
    }

    /// Fold the provider results into a day-by-day itinerary. Never fails: a
    /// generation problem drops us onto the deterministic composer, which only
    /// needs the inputs it is handed.
    pub async fn aggregate(
        &self,
        plan: &SearchPlan,
        lodging: &[LodgingResult],
        activities: &[ActivityResult],
        dining: &[DiningResult],
    ) -> AggregatedItinerary {
        match self.try_generate(plan, lodging, activities, dining).await {
            Ok((days, chosen_lodging)) => AggregatedItinerary {
                days,
                chosen_lodging,
                degraded: false,
            },
            Err(e) => {
                log::warn!(
                    "itinerary aggregation failed for {}, composing fallback: {e:#}",
                    plan.destination
                );
                compose_fallback(plan, lodging, activities, dining)
            }
        }
    }

    async fn try_generate(
        &self,
        plan: &SearchPlan,
        lodging: &[LodgingResult],
        activities: &[ActivityResult],
        dining: &[DiningResult],
    ) -> Result<(Vec<SuggestedDay>, Option<LodgingResult>), GenerateError> {
        let instruction = build_instruction(plan, lodging, activities, dining);
        let generated = generate_as::<GeneratedItinerary>(
            self.generator.as_ref(),
            &instruction,
            itinerary_schema(),
        )
        .await?;
        resolve(plan, generated, lodging, activities, dining)
    }
}

#[derive(Deserialize, Debug)]
struct GeneratedItinerary {
    #[serde(default)]
    chosen_lodging_id: Option<String>,
    #[serde(default)]
    days: Vec<GeneratedDay>,
}

#[derive(Deserialize, Debug)]
struct GeneratedDay {
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    morning: GeneratedBlock,
    #[serde(default)]
    afternoon: GeneratedBlock,
    #[serde(default)]
    evening: GeneratedBlock,
    #[serde(default)]
    tips: Vec<String>,
}

#[derive(Deserialize, Debug, Default)]
struct GeneratedBlock {
    #[serde(default)]
    activity_ids: Vec<String>,
    #[serde(default)]
    meal_id: Option<String>,
}

fn build_instruction(
    plan: &SearchPlan,
    lodging: &[LodgingResult],
    activities: &[ActivityResult],
    dining: &[DiningResult],
) -> String {
    let lodging_lines: Vec<String> = lodging
        .iter()
        .take(TOP_N)
        .map(|l| {
            format!(
                "{} | {} | ${:.0}/night | {:.1} stars | score {}",
                l.id, l.name, l.price_per_night, l.star_rating, l.vibe_score
            )
        })
        .collect();
    let activity_lines: Vec<String> = activities
        .iter()
        .take(TOP_N)
        .map(|a| {
            format!(
                "{} | {} | {} | best: {:?} | score {}",
                a.id, a.name, a.category, a.best_time, a.vibe_score
            )
        })
        .collect();
    let dining_lines: Vec<String> = dining
        .iter()
        .take(TOP_N)
        .map(|d| {
            let meals: Vec<String> = d.meal_types.iter().map(|m| format!("{m:?}")).collect();
            format!(
                "{} | {} | {} | {} | score {}",
                d.id,
                d.name,
                d.cuisine,
                meals.join("/"),
                d.vibe_score
            )
        })
        .collect();

    format!(
        "Build a {days}-day itinerary for {destination}, {start} to {end}, \
         vibes: {vibes}.\n\
         Reference items strictly by the ids below; never invent ids.\n\
         Lodging candidates:\n{lodging}\n\
         Activity candidates:\n{activities}\n\
         Dining candidates:\n{dining}\n\
         Return exactly {days} days. Each day needs a title, a one-sentence \
         summary, morning/afternoon/evening blocks with activity ids and an \
         optional meal id each, and up to three practical tips. Also nominate one \
         lodging id for the whole stay.",
        days = plan.nights + 1,
        destination = plan.destination,
        start = plan.start_date,
        end = plan.end_date,
        vibes = plan.vibes.canonical.join(", "),
        lodging = lodging_lines.join("\n"),
        activities = activity_lines.join("\n"),
        dining = dining_lines.join("\n"),
    )
}

/// Turn the model's id-referenced day sketch back into full objects. Unknown
/// ids are dropped silently; a day count that disagrees with the trip length is
/// a generation failure, so exactly one code path upholds the nights+1 rule.
fn resolve(
    plan: &SearchPlan,
    generated: GeneratedItinerary,
    lodging: &[LodgingResult],
    activities: &[ActivityResult],
    dining: &[DiningResult],
) -> Result<(Vec<SuggestedDay>, Option<LodgingResult>), GenerateError> {
    let expected_days = (plan.nights + 1) as usize;
    if generated.days.len() != expected_days {
        return Err(GenerateError::MalformedOutput(format!(
            "expected {expected_days} days, model returned {}",
            generated.days.len()
        )));
    }

    let activity_by_id: HashMap<&str, &ActivityResult> =
        activities.iter().map(|a| (a.id.as_str(), a)).collect();
    let dining_by_id: HashMap<&str, &DiningResult> =
        dining.iter().map(|d| (d.id.as_str(), d)).collect();

    let chosen_lodging = generated
        .chosen_lodging_id
        .as_deref()
        .and_then(|id| lodging.iter().find(|l| l.id == id))
        .or_else(|| lodging.first())
        .cloned();

    let resolve_block = |block: &GeneratedBlock| DayBlock {
        activities: block
            .activity_ids
            .iter()
            .filter_map(|id| activity_by_id.get(id.as_str()).map(|a| (*a).clone()))
            .collect(),
        meal: block
            .meal_id
            .as_deref()
            .and_then(|id| dining_by_id.get(id).map(|d| (*d).clone())),
    };

    let mut days = Vec::with_capacity(expected_days);
    for (i, generated_day) in generated.days.iter().enumerate() {
        let morning = resolve_block(&generated_day.morning);
        let afternoon = resolve_block(&generated_day.afternoon);
        let evening = resolve_block(&generated_day.evening);
        let (estimated_cost, currency) = estimate_day_cost(
            chosen_lodging.as_ref(),
            [&morning, &afternoon, &evening],
            plan.travelers,
        );

        let title = if generated_day.title.is_empty() {
            format!("Day {} in {}", i + 1, plan.destination)
        } else {
            generated_day.title.clone()
        };

        days.push(SuggestedDay {
            day_number: (i + 1) as u32,
            date: plan.start_date + Duration::days(i as i64),
            title,
            summary: generated_day.summary.clone(),
            lodging_id: chosen_lodging.as_ref().map(|l| l.id.clone()),
            morning,
            afternoon,
            evening,
            estimated_cost,
            currency,
            tips: generated_day.tips.clone(),
        });
    }

    Ok((days, chosen_lodging))
}

/// Deterministic itinerary composer: pure function of its inputs, no generative
/// calls, no fresh ids. Two invocations over the same data produce identical
/// day structures.
///
/// Activities are bucketed by best time of day ("any" feeds all three buckets)
/// and dealt two per day per bucket at a rolling offset of `day_index * 2`, so
/// consecutive days take disjoint slices and exhausted buckets simply go quiet.
/// Dining cycles each bucket's meal-type candidates by `day_index % len`.
pub fn compose_fallback(
    plan: &SearchPlan,
    lodging: &[LodgingResult],
    activities: &[ActivityResult],
    dining: &[DiningResult],
) -> AggregatedItinerary {
    let chosen_lodging = lodging.first().cloned();

    let bucket = |time: TimeOfDay| -> Vec<&ActivityResult> {
        activities
            .iter()
            .filter(|a| a.best_time == time || a.best_time == TimeOfDay::Any)
            .collect()
    };
    let morning_pool = bucket(TimeOfDay::Morning);
    let afternoon_pool = bucket(TimeOfDay::Afternoon);
    let evening_pool = bucket(TimeOfDay::Evening);

    let meals = |meal: MealType| -> Vec<&DiningResult> {
        dining.iter().filter(|d| d.meal_types.contains(&meal)).collect()
    };
    let breakfast_pool = meals(MealType::Breakfast);
    let lunch_pool = meals(MealType::Lunch);
    let dinner_pool = meals(MealType::Dinner);

    let total_days = (plan.nights + 1) as usize;
    let mut days = Vec::with_capacity(total_days);

    for day_index in 0..total_days {
        let offset = day_index * 2;
        let slice = |pool: &[&ActivityResult]| -> Vec<ActivityResult> {
            pool.iter()
                .skip(offset)
                .take(2)
                .map(|a| (*a).clone())
                .collect()
        };
        let pick = |pool: &[&DiningResult]| -> Option<DiningResult> {
            if pool.is_empty() {
                None
            } else {
                Some(pool[day_index % pool.len()].clone())
            }
        };

        let morning = DayBlock {
            activities: slice(&morning_pool),
            meal: pick(&breakfast_pool),
        };
        let afternoon = DayBlock {
            activities: slice(&afternoon_pool),
            meal: pick(&lunch_pool),
        };
        let evening = DayBlock {
            activities: slice(&evening_pool),
            meal: pick(&dinner_pool),
        };

        let (estimated_cost, currency) = estimate_day_cost(
            chosen_lodging.as_ref(),
            [&morning, &afternoon, &evening],
            plan.travelers,
        );

        days.push(SuggestedDay {
            day_number: (day_index + 1) as u32,
            date: plan.start_date + Duration::days(day_index as i64),
            title: format!("Day {} in {}", day_index + 1, plan.destination),
            summary: "A self-guided day built from the trip's top-rated finds.".to_string(),
            lodging_id: chosen_lodging.as_ref().map(|l| l.id.clone()),
            morning,
            afternoon,
            evening,
            estimated_cost,
            currency,
            tips: FALLBACK_TIPS.iter().map(|t| t.to_string()).collect(),
        });
    }

    AggregatedItinerary {
        days,
        chosen_lodging,
        degraded: true,
    }
}

/// Nightly lodging + activity prices + a rough per-meal spend of
/// 25 × price_level per traveler, rounded to cents.
fn estimate_day_cost(
    lodging: Option<&LodgingResult>,
    blocks: [&DayBlock; 3],
    travelers: u32,
) -> (f64, String) {
    let mut total = lodging.map(|l| l.price_per_night).unwrap_or(0.0);
    for block in blocks {
        for activity in &block.activities {
            total += activity.price * travelers as f64;
        }
        if let Some(meal) = &block.meal {
            total += 25.0 * meal.price_level as f64 * travelers as f64;
        }
    }
    let currency = lodging
        .map(|l| l.currency.clone())
        .unwrap_or_else(|| "USD".to_string());
    ((total * 100.0).round() / 100.0, currency)
}

fn itinerary_schema() -> Value {
    let block = json!({
        "type": "OBJECT",
        "properties": {
            "activity_ids": { "type": "ARRAY", "items": { "type": "STRING" } },
            "meal_id": { "type": "STRING" }
        }
    });
    json!({
        "type": "OBJECT",
        "properties": {
            "chosen_lodging_id": { "type": "STRING" },
            "days": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "summary": { "type": "STRING" },
                        "morning": block,
                        "afternoon": block,
                        "evening": block,
                        "tips": { "type": "ARRAY", "items": { "type": "STRING" } }
                    },
                    "required": ["title", "morning", "afternoon", "evening"]
                }
            }
        },
        "required": ["days"]
    })
}
