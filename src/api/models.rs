use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data_models::{
    BudgetTier, SearchProgress, SearchResults, SearchStatus, TravelerType,
};

#[derive(Debug, Deserialize)]
pub struct StartSearchRequest {
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_travelers")]
    pub travelers: u32,
    pub traveler_type: Option<TravelerType>,
    #[serde(default)]
    pub vibes: Vec<String>,
    pub budget: BudgetTier,
}

fn default_travelers() -> u32 {
    1
}

#[derive(Debug, Serialize)]
pub struct StartSearchResponse {
    pub search_id: String,
    pub status: SearchStatus,
}

#[derive(Debug, Serialize)]
pub struct SearchStatusResponse {
    pub search_id: String,
    pub status: SearchStatus,
    pub progress: SearchProgress,
    pub error: Option<String>,
    pub results: Option<SearchResults>,
}
