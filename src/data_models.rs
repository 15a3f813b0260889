use std::collections::BTreeMap;

use chrono::NaiveDate;
use mongodb::bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TravelerType {
    Solo,
    Couple,
    Family,
    Friends,
    Business,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BudgetTier {
    Budget,
    Moderate,
    Luxury,
}

/// What the traveler asked for. Immutable once a search starts.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SearchInput {
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub travelers: u32,
    pub traveler_type: Option<TravelerType>,
    pub vibes: Vec<String>,
    pub budget: BudgetTier,
}

impl SearchInput {
    pub fn nights(&self) -> u32 {
        (self.end_date - self.start_date).num_days().max(0) as u32
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct LodgingCriteria {
    pub price_min: u32,
    pub price_max: u32,
    pub stars_min: u8,
    pub stars_max: u8,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub neighborhoods: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ActivityCriteria {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub pace: String,
    #[serde(default)]
    pub must_see: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct DiningCriteria {
    #[serde(default)]
    pub cuisines: Vec<String>,
    #[serde(default)]
    pub price_tier: String,
    #[serde(default)]
    pub dietary: Vec<String>,
    #[serde(default)]
    pub meal_priorities: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct VibeInterpretation {
    /// The trip's vibe tags, as the providers should understand them.
    #[serde(default)]
    pub canonical: Vec<String>,
    /// Positive search keywords expanded from the vibes.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Things to steer clear of.
    #[serde(default)]
    pub avoid: Vec<String>,
}

/// The shared search contract every provider reads. Derived once per search,
/// read-only downstream.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SearchPlan {
    pub destination: String,
    pub country: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub nights: u32,
    pub travelers: u32,
    pub traveler_type: Option<TravelerType>,
    pub budget: BudgetTier,
    pub search_priorities: Vec<String>,
    pub lodging: LodgingCriteria,
    pub activity: ActivityCriteria,
    pub dining: DiningCriteria,
    pub vibes: VibeInterpretation,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct LocationInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lng: f64,
    #[serde(default)]
    pub neighborhood: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AffiliateRef {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub partner: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Any,
}

impl Default for TimeOfDay {
    fn default() -> Self {
        TimeOfDay::Any
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LodgingResult {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price_per_night: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub star_rating: f32,
    #[serde(default)]
    pub user_rating: f32,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub location: LocationInfo,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub affiliate: AffiliateRef,
    #[serde(default)]
    pub vibe_score: i64,
    #[serde(default)]
    pub matched_vibes: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ActivityResult {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub duration_hours: f64,
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub best_time: TimeOfDay,
    #[serde(default)]
    pub location: LocationInfo,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub affiliate: AffiliateRef,
    #[serde(default)]
    pub vibe_score: i64,
    #[serde(default)]
    pub matched_vibes: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DiningResult {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cuisine: String,
    /// 1 (street food) through 4 (fine dining).
    #[serde(default = "default_price_level")]
    pub price_level: u8,
    #[serde(default)]
    pub meal_types: Vec<MealType>,
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub location: LocationInfo,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub affiliate: AffiliateRef,
    #[serde(default)]
    pub vibe_score: i64,
    #[serde(default)]
    pub matched_vibes: Vec<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_price_level() -> u8 {
    2
}

/// One scheduled slot of a day: zero or more activities plus an optional meal.
/// Items are embedded copies of provider results, never fabricated in place.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct DayBlock {
    #[serde(default)]
    pub activities: Vec<ActivityResult>,
    #[serde(default)]
    pub meal: Option<DiningResult>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SuggestedDay {
    /// 1-based and contiguous across the itinerary.
    pub day_number: u32,
    pub date: NaiveDate,
    pub title: String,
    pub summary: String,
    pub lodging_id: Option<String>,
    pub morning: DayBlock,
    pub afternoon: DayBlock,
    pub evening: DayBlock,
    pub estimated_cost: f64,
    pub currency: String,
    pub tips: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Plan,
    Lodging,
    Activity,
    Dining,
    Aggregate,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Plan,
        Stage::Lodging,
        Stage::Activity,
        Stage::Dining,
        Stage::Aggregate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Plan => "plan",
            Stage::Lodging => "lodging",
            Stage::Activity => "activity",
            Stage::Dining => "dining",
            Stage::Aggregate => "aggregate",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Pending,
    Searching,
    Done,
    Error,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Pending => "pending",
            AgentStatus::Searching => "searching",
            AgentStatus::Done => "done",
            AgentStatus::Error => "error",
        }
    }
}

/// Per-stage status map, keyed by stage name so it round-trips 1:1 with the
/// stored document. Merge-only: a stage's write never clobbers what the other
/// stages wrote.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SearchProgress(pub BTreeMap<String, AgentStatus>);

impl SearchProgress {
    /// All five stages pending, the state every search record starts in.
    pub fn all_pending() -> Self {
        SearchProgress(
            Stage::ALL
                .iter()
                .map(|s| (s.as_str().to_string(), AgentStatus::Pending))
                .collect(),
        )
    }

    /// Shallow merge: keys present in `partial` overwrite, everything else is
    /// preserved. Idempotent, and order-independent across distinct keys.
    pub fn merge(&mut self, partial: &[(Stage, AgentStatus)]) {
        for (stage, status) in partial {
            self.0.insert(stage.as_str().to_string(), *status);
        }
    }

    pub fn get(&self, stage: Stage) -> Option<AgentStatus> {
        self.0.get(stage.as_str()).copied()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchStatus {
    Pending,
    Searching,
    Completed,
    Error,
}

impl SearchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStatus::Pending => "pending",
            SearchStatus::Searching => "searching",
            SearchStatus::Completed => "completed",
            SearchStatus::Error => "error",
        }
    }
}

/// Everything a finished search produced.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SearchResults {
    pub plan: SearchPlan,
    pub lodging: Vec<LodgingResult>,
    pub activities: Vec<ActivityResult>,
    pub dining: Vec<DiningResult>,
    pub itinerary: Vec<SuggestedDay>,
    pub chosen_lodging: Option<LodgingResult>,
    /// True when the itinerary came from the deterministic composer instead of
    /// the generative aggregation path.
    #[serde(default)]
    pub degraded: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SearchRecord {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub search_id: String,
    pub input: SearchInput,
    pub status: SearchStatus,
    pub progress: SearchProgress,
    pub error: Option<String>,
    pub results: Option<SearchResults>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl SearchRecord {
    pub fn new(search_id: String, input: SearchInput) -> SearchRecord {
        SearchRecord {
            id: ObjectId::new(),
            search_id,
            input,
            status: SearchStatus::Pending,
            progress: SearchProgress::all_pending(),
            error: None,
            results: None,
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        }
    }
}

/// Terminal outcome of a search run. `run_search` always resolves to one of
/// these; it never propagates an error to the caller.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SearchOutcome {
    pub status: SearchStatus,
    pub results: Option<SearchResults>,
    pub error: Option<String>,
}

impl SearchOutcome {
    pub fn completed(results: SearchResults) -> SearchOutcome {
        SearchOutcome {
            status: SearchStatus::Completed,
            results: Some(results),
            error: None,
        }
    }

    pub fn error(message: String) -> SearchOutcome {
        SearchOutcome {
            status: SearchStatus::Error,
            results: None,
            error: Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn nights_from_date_range() {
        let input = SearchInput {
            destination: "Lisbon".to_string(),
            start_date: d("2026-03-01"),
            end_date: d("2026-03-04"),
            travelers: 2,
            traveler_type: Some(TravelerType::Couple),
            vibes: vec!["foodie".to_string(), "cultural".to_string()],
            budget: BudgetTier::Moderate,
        };
        assert_eq!(input.nights(), 3);

        let same_day = SearchInput {
            end_date: d("2026-03-01"),
            ..input
        };
        assert_eq!(same_day.nights(), 0);
    }

    #[test]
    fn progress_merge_is_idempotent() {
        let mut progress = SearchProgress::all_pending();
        let update = [(Stage::Lodging, AgentStatus::Searching)];

        progress.merge(&update);
        let once = progress.clone();
        progress.merge(&update);
        assert_eq!(progress, once);
    }

    #[test]
    fn progress_merge_is_order_independent_across_stages() {
        let lodging = [(Stage::Lodging, AgentStatus::Done)];
        let dining = [(Stage::Dining, AgentStatus::Searching)];

        let mut a = SearchProgress::all_pending();
        a.merge(&lodging);
        a.merge(&dining);

        let mut b = SearchProgress::all_pending();
        b.merge(&dining);
        b.merge(&lodging);

        assert_eq!(a, b);
    }

    #[test]
    fn progress_merge_preserves_untouched_stages() {
        let mut progress = SearchProgress::all_pending();
        progress.merge(&[(Stage::Plan, AgentStatus::Done)]);

        assert_eq!(progress.get(Stage::Plan), Some(AgentStatus::Done));
        for stage in [Stage::Lodging, Stage::Activity, Stage::Dining, Stage::Aggregate] {
            assert_eq!(progress.get(stage), Some(AgentStatus::Pending));
        }
    }
}
