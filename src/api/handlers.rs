use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use nanoid::nanoid;
use std::sync::Arc;

use crate::data_models::{SearchInput, SearchRecord};

use super::AppState;
use super::models::{SearchStatusResponse, StartSearchRequest, StartSearchResponse};

pub async fn start_search_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartSearchRequest>,
) -> Result<(StatusCode, Json<StartSearchResponse>), (StatusCode, String)> {
    if request.destination.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Destination cannot be empty".to_string(),
        ));
    }
    if request.end_date < request.start_date {
        return Err((
            StatusCode::BAD_REQUEST,
            "End date must not be before start date".to_string(),
        ));
    }
    if request.travelers == 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Traveler count must be at least 1".to_string(),
        ));
    }

    let input = SearchInput {
        destination: request.destination.trim().to_string(),
        start_date: request.start_date,
        end_date: request.end_date,
        travelers: request.travelers,
        traveler_type: request.traveler_type,
        vibes: request.vibes,
        budget: request.budget,
    };

    let search_id = nanoid!();
    let record = SearchRecord::new(search_id.clone(), input.clone());
    state.store.create(&record).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Database error: {}", e),
        )
    })?;

    // The search runs in the background; callers poll by id.
    let workflow = state.workflow.clone();
    let id = search_id.clone();
    tokio::spawn(async move {
        workflow.run_search(&id, input).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(StartSearchResponse {
            search_id,
            status: record.status,
        }),
    ))
}

pub async fn get_search_handler(
    State(state): State<Arc<AppState>>,
    Path(search_id): Path<String>,
) -> Result<Json<SearchStatusResponse>, (StatusCode, String)> {
    let record = state.store.find(&search_id).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Database error: {}", e),
        )
    })?;

    let record = record.ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            format!("No search with id {}", search_id),
        )
    })?;

    Ok(Json(SearchStatusResponse {
        search_id: record.search_id,
        status: record.status,
        progress: record.progress,
        error: record.error,
        results: record.results,
    }))
}
