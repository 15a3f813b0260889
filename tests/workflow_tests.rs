use anyhow::Result;
use serde_json::{Value, json};
use std::sync::Arc;

use tripsmith::data_models::{
    AgentStatus, BudgetTier, SearchInput, SearchStatus, Stage, TravelerType,
};
use tripsmith::db::SearchStore;
use tripsmith::workflow::SearchWorkflow;

mod test_helpers {
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use tripsmith::data_models::{
        AgentStatus, SearchRecord, SearchResults, SearchStatus, Stage,
    };
    use tripsmith::db::SearchStore;
    use tripsmith::genai::{GenerateError, Generative};

    /// Scripted generative service: each orchestration stage either gets its
    /// canned JSON or a generation failure.
    #[derive(Default)]
    pub struct ScriptedGenerator {
        pub plan: Option<Value>,
        pub lodging: Option<Value>,
        pub activity: Option<Value>,
        pub dining: Option<Value>,
        pub itinerary: Option<Value>,
    }

    impl ScriptedGenerator {
        fn route(&self, instruction: &str) -> &Option<Value> {
            if instruction.contains("travel search planner") {
                &self.plan
            } else if instruction.contains("lodging options") {
                &self.lodging
            } else if instruction.contains("activities and experiences") {
                &self.activity
            } else if instruction.contains("places to eat") {
                &self.dining
            } else {
                &self.itinerary
            }
        }
    }

    #[async_trait]
    impl Generative for ScriptedGenerator {
        async fn generate(
            &self,
            instruction: &str,
            _schema: Value,
        ) -> Result<Value, GenerateError> {
            match self.route(instruction) {
                Some(value) => Ok(value.clone()),
                None => Err(GenerateError::MalformedOutput(
                    "scripted failure".to_string(),
                )),
            }
        }
    }

    /// In-memory `SearchStore` with the same merge-only progress semantics as
    /// the MongoDB-backed one.
    #[derive(Default)]
    pub struct MemoryStore {
        records: Mutex<HashMap<String, SearchRecord>>,
    }

    #[async_trait]
    impl SearchStore for MemoryStore {
        async fn create(&self, record: &SearchRecord) -> Result<()> {
            self.records
                .lock()
                .unwrap()
                .insert(record.search_id.clone(), record.clone());
            Ok(())
        }

        async fn find(&self, search_id: &str) -> Result<Option<SearchRecord>> {
            Ok(self.records.lock().unwrap().get(search_id).cloned())
        }

        async fn upsert_progress(
            &self,
            search_id: &str,
            partial: &[(Stage, AgentStatus)],
        ) -> Result<()> {
            let mut records = self.records.lock().unwrap();
            if let Some(record) = records.get_mut(search_id) {
                record.progress.merge(partial);
            }
            Ok(())
        }

        async fn set_status(
            &self,
            search_id: &str,
            status: SearchStatus,
            error: Option<&str>,
        ) -> Result<()> {
            let mut records = self.records.lock().unwrap();
            if let Some(record) = records.get_mut(search_id) {
                record.status = status;
                if let Some(message) = error {
                    record.error = Some(message.to_string());
                }
            }
            Ok(())
        }

        async fn save_results(&self, search_id: &str, results: &SearchResults) -> Result<()> {
            let mut records = self.records.lock().unwrap();
            if let Some(record) = records.get_mut(search_id) {
                record.results = Some(results.clone());
            }
            Ok(())
        }
    }

    /// A store whose every call fails, for the catastrophic path.
    pub struct BrokenStore;

    #[async_trait]
    impl SearchStore for BrokenStore {
        async fn create(&self, _record: &SearchRecord) -> Result<()> {
            anyhow::bail!("store unreachable")
        }

        async fn find(&self, _search_id: &str) -> Result<Option<SearchRecord>> {
            anyhow::bail!("store unreachable")
        }

        async fn upsert_progress(
            &self,
            _search_id: &str,
            _partial: &[(Stage, AgentStatus)],
        ) -> Result<()> {
            anyhow::bail!("store unreachable")
        }

        async fn set_status(
            &self,
            _search_id: &str,
            _status: SearchStatus,
            _error: Option<&str>,
        ) -> Result<()> {
            anyhow::bail!("store unreachable")
        }

        async fn save_results(
            &self,
            _search_id: &str,
            _results: &SearchResults,
        ) -> Result<()> {
            anyhow::bail!("store unreachable")
        }
    }
}

use test_helpers::*;

fn lisbon_input() -> SearchInput {
    SearchInput {
        destination: "Lisbon".to_string(),
        start_date: chrono::NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        end_date: chrono::NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
        travelers: 2,
        traveler_type: Some(TravelerType::Couple),
        vibes: vec!["foodie".to_string(), "cultural".to_string()],
        budget: BudgetTier::Moderate,
    }
}

fn plan_details_json() -> Value {
    json!({
        "country": "Portugal",
        "search_priorities": ["dining", "activity", "lodging"],
        "lodging": {
            "price_min": 110, "price_max": 220, "stars_min": 3, "stars_max": 4,
            "amenities": ["wifi"], "neighborhoods": ["Alfama", "Baixa"]
        },
        "activity": {
            "categories": ["food tour", "museum"], "pace": "moderate",
            "must_see": ["Belém Tower"], "interests": ["tasting", "heritage"]
        },
        "dining": {
            "cuisines": ["portuguese", "seafood"], "price_tier": "$$",
            "dietary": [], "meal_priorities": ["dinner"]
        },
        "vibes": {
            "canonical": ["foodie", "cultural"],
            "keywords": ["tasting", "market", "museum"],
            "avoid": ["tourist trap"]
        }
    })
}

fn lodging_json() -> Value {
    json!([
        { "name": "Alfama Boutique", "description": "tile-clad guesthouse",
          "price_per_night": 140.0, "star_rating": 4.0, "vibe_score": 85 },
        { "name": "Baixa Rooms", "description": "central and simple",
          "price_per_night": 105.0, "star_rating": 3.0, "vibe_score": 60 }
    ])
}

fn activity_json() -> Value {
    json!([
        { "name": "Tram 28 loop", "category": "sightseeing", "price": 3.0,
          "best_time": "morning", "vibe_score": 70 },
        { "name": "Fado evening", "category": "music", "price": 35.0,
          "best_time": "evening", "vibe_score": 90 },
        { "name": "Tile museum", "category": "museum", "price": 8.0,
          "best_time": "afternoon", "vibe_score": 75 },
        { "name": "Miradouro walk", "category": "walking", "price": 0.0,
          "best_time": "any", "vibe_score": 55 }
    ])
}

fn dining_json() -> Value {
    json!([
        { "name": "Pastelaria Central", "cuisine": "bakery", "price_level": 1,
          "meal_types": ["breakfast"], "vibe_score": 65 },
        { "name": "Mercado stalls", "cuisine": "portuguese", "price_level": 2,
          "meal_types": ["lunch", "dinner"], "vibe_score": 88 },
        { "name": "Marisqueira Azul", "cuisine": "seafood", "price_level": 3,
          "meal_types": ["dinner"], "vibe_score": 80 }
    ])
}

fn itinerary_json(days: usize) -> Value {
    let day = json!({
        "title": "Hills and tiles",
        "summary": "Old town wandering with long meals.",
        "morning": { "activity_ids": [], "meal_id": null },
        "afternoon": { "activity_ids": [], "meal_id": null },
        "evening": { "activity_ids": [], "meal_id": null },
        "tips": ["Wear grippy shoes on the calçada."]
    });
    json!({
        "chosen_lodging_id": "not-a-real-id",
        "days": vec![day; days]
    })
}

fn workflow_with(
    generator: ScriptedGenerator,
    store: Arc<dyn tripsmith::db::SearchStore>,
) -> SearchWorkflow {
    SearchWorkflow::new(Arc::new(generator), store)
}

#[tokio::test]
async fn completed_search_has_contiguous_days_and_done_progress() -> Result<()> {
    let generator = ScriptedGenerator {
        plan: Some(plan_details_json()),
        lodging: Some(lodging_json()),
        activity: Some(activity_json()),
        dining: Some(dining_json()),
        itinerary: Some(itinerary_json(4)),
    };
    let store = Arc::new(MemoryStore::default());
    let workflow = workflow_with(generator, store.clone());

    let record = tripsmith::data_models::SearchRecord::new("s1".to_string(), lisbon_input());
    store.create(&record).await?;

    let outcome = workflow.run_search("s1", lisbon_input()).await;

    assert_eq!(outcome.status, SearchStatus::Completed);
    let results = outcome.results.expect("completed outcome carries results");
    assert_eq!(results.plan.nights, 3);
    assert_eq!(results.itinerary.len(), 4);
    for (i, day) in results.itinerary.iter().enumerate() {
        assert_eq!(day.day_number, (i + 1) as u32);
        assert_eq!(
            day.date,
            chrono::NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
                + chrono::Duration::days(i as i64)
        );
    }
    assert!(!results.degraded);
    // bad nomination falls back to the top-ranked lodging
    assert_eq!(results.chosen_lodging.unwrap().name, "Alfama Boutique");

    let record = store.find("s1").await?.unwrap();
    assert_eq!(record.status, SearchStatus::Completed);
    assert!(record.results.is_some());
    for stage in Stage::ALL {
        assert_eq!(record.progress.get(stage), Some(AgentStatus::Done));
    }
    Ok(())
}

#[tokio::test]
async fn aggregation_failure_composes_fallback_itinerary() -> Result<()> {
    let generator = ScriptedGenerator {
        plan: Some(plan_details_json()),
        lodging: Some(lodging_json()),
        activity: Some(activity_json()),
        dining: Some(dining_json()),
        itinerary: None, // aggregation generation fails
    };
    let store = Arc::new(MemoryStore::default());
    let workflow = workflow_with(generator, store.clone());
    store
        .create(&tripsmith::data_models::SearchRecord::new(
            "s2".to_string(),
            lisbon_input(),
        ))
        .await?;

    let outcome = workflow.run_search("s2", lisbon_input()).await;

    assert_eq!(outcome.status, SearchStatus::Completed);
    let results = outcome.results.unwrap();
    assert!(results.degraded);
    assert_eq!(results.itinerary.len(), 4);

    // every bucket with a non-empty candidate list gets a meal every day
    for day in &results.itinerary {
        assert!(day.morning.meal.is_some(), "breakfast candidates exist");
        assert!(day.afternoon.meal.is_some(), "lunch candidates exist");
        assert!(day.evening.meal.is_some(), "dinner candidates exist");
        assert_eq!(day.tips.len(), 2);
    }

    // no dangling references: every embedded item is from the collections
    let activity_ids: Vec<&str> = results.activities.iter().map(|a| a.id.as_str()).collect();
    let dining_ids: Vec<&str> = results.dining.iter().map(|d| d.id.as_str()).collect();
    for day in &results.itinerary {
        for block in [&day.morning, &day.afternoon, &day.evening] {
            for activity in &block.activities {
                assert!(activity_ids.contains(&activity.id.as_str()));
            }
            if let Some(meal) = &block.meal {
                assert!(dining_ids.contains(&meal.id.as_str()));
            }
        }
    }
    Ok(())
}

#[tokio::test]
async fn failed_activity_provider_does_not_sink_the_search() -> Result<()> {
    let generator = ScriptedGenerator {
        plan: Some(plan_details_json()),
        lodging: Some(lodging_json()),
        activity: None, // provider-level generation failure
        dining: Some(dining_json()),
        itinerary: None, // exercise the deterministic composer too
    };
    let store = Arc::new(MemoryStore::default());
    let workflow = workflow_with(generator, store.clone());
    store
        .create(&tripsmith::data_models::SearchRecord::new(
            "s3".to_string(),
            lisbon_input(),
        ))
        .await?;

    let outcome = workflow.run_search("s3", lisbon_input()).await;

    assert_eq!(outcome.status, SearchStatus::Completed);
    let results = outcome.results.unwrap();
    assert!(results.activities.is_empty());
    assert!(!results.lodging.is_empty());
    assert!(!results.dining.is_empty());
    assert_eq!(results.itinerary.len(), 4);
    for day in &results.itinerary {
        assert!(day.morning.activities.is_empty());
        assert!(day.afternoon.activities.is_empty());
        assert!(day.evening.activities.is_empty());
        assert!(day.evening.meal.is_some());
    }

    // a provider coming back empty still counts as done
    let record = store.find("s3").await?.unwrap();
    assert_eq!(record.progress.get(Stage::Activity), Some(AgentStatus::Done));
    Ok(())
}

#[tokio::test]
async fn plan_generation_failure_uses_table_driven_plan() -> Result<()> {
    let generator = ScriptedGenerator {
        plan: None, // plan derivation fails
        lodging: Some(lodging_json()),
        activity: Some(activity_json()),
        dining: Some(dining_json()),
        itinerary: Some(itinerary_json(4)),
    };
    let store = Arc::new(MemoryStore::default());
    let workflow = workflow_with(generator, store.clone());
    store
        .create(&tripsmith::data_models::SearchRecord::new(
            "s4".to_string(),
            lisbon_input(),
        ))
        .await?;

    let outcome = workflow.run_search("s4", lisbon_input()).await;

    assert_eq!(outcome.status, SearchStatus::Completed);
    let plan = outcome.results.unwrap().plan;
    // moderate tier straight from the budget table
    assert_eq!(plan.lodging.price_min, 90);
    assert_eq!(plan.lodging.price_max, 250);
    assert_eq!(plan.activity.pace, "moderate");
    assert!(plan.vibes.avoid.is_empty());
    assert_eq!(plan.vibes.canonical, vec!["foodie", "cultural"]);
    Ok(())
}

#[tokio::test]
async fn everything_failing_still_completes_with_empty_but_structured_itinerary() -> Result<()> {
    let generator = ScriptedGenerator::default(); // every generation fails
    let store = Arc::new(MemoryStore::default());
    let workflow = workflow_with(generator, store.clone());
    store
        .create(&tripsmith::data_models::SearchRecord::new(
            "s5".to_string(),
            lisbon_input(),
        ))
        .await?;

    let outcome = workflow.run_search("s5", lisbon_input()).await;

    assert_eq!(outcome.status, SearchStatus::Completed);
    let results = outcome.results.unwrap();
    assert!(results.degraded);
    assert_eq!(results.itinerary.len(), 4);
    assert!(results.lodging.is_empty());
    assert!(results.chosen_lodging.is_none());
    Ok(())
}

#[tokio::test]
async fn store_failure_is_the_only_fatal_error() -> Result<()> {
    let generator = ScriptedGenerator {
        plan: Some(plan_details_json()),
        lodging: Some(lodging_json()),
        activity: Some(activity_json()),
        dining: Some(dining_json()),
        itinerary: Some(itinerary_json(4)),
    };
    let workflow = workflow_with(generator, Arc::new(BrokenStore));

    let outcome = workflow.run_search("s6", lisbon_input()).await;

    assert_eq!(outcome.status, SearchStatus::Error);
    assert!(outcome.results.is_none());
    assert!(outcome.error.unwrap().contains("store unreachable"));
    Ok(())
}

#[tokio::test]
async fn wrong_generated_day_count_degrades_instead_of_lying() -> Result<()> {
    let generator = ScriptedGenerator {
        plan: Some(plan_details_json()),
        lodging: Some(lodging_json()),
        activity: Some(activity_json()),
        dining: Some(dining_json()),
        itinerary: Some(itinerary_json(2)), // model returned 2 days for a 4-day trip
    };
    let store = Arc::new(MemoryStore::default());
    let workflow = workflow_with(generator, store.clone());
    store
        .create(&tripsmith::data_models::SearchRecord::new(
            "s7".to_string(),
            lisbon_input(),
        ))
        .await?;

    let outcome = workflow.run_search("s7", lisbon_input()).await;

    assert_eq!(outcome.status, SearchStatus::Completed);
    let results = outcome.results.unwrap();
    assert!(results.degraded);
    assert_eq!(results.itinerary.len(), 4);
    Ok(())
}
