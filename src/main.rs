use std::sync::Arc;

use tripsmith::api::{AppState, create_router};
use tripsmith::config::CONFIG;
use tripsmith::db::{Database, MongoSearchStore, SearchStore};
use tripsmith::genai::{GeminiClient, Generative};
use tripsmith::workflow::SearchWorkflow;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber (handles both tracing and log crate)
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .init();

    let db = Database::from_config().await?;
    let store: Arc<dyn SearchStore> = Arc::new(MongoSearchStore::new(&db));
    let generator: Arc<dyn Generative> = Arc::new(GeminiClient::from_config(&CONFIG));

    let workflow = Arc::new(SearchWorkflow::new(generator, store.clone()));
    let state = Arc::new(AppState { store, workflow });

    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(&CONFIG.bind_addr).await?;
    log::info!("listening on {}", CONFIG.bind_addr);
    axum::serve(listener, router).await?;

    Ok(())
}
