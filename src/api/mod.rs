use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::db::SearchStore;
use crate::workflow::SearchWorkflow;

pub mod handlers;
pub mod models;

pub struct AppState {
    pub store: Arc<dyn SearchStore>,
    pub workflow: Arc<SearchWorkflow>,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/search", post(handlers::start_search_handler))
        .route("/api/search/:search_id", get(handlers::get_search_handler))
        .with_state(state)
        .layer(cors)
}
