use anyhow::{Context, Result};
use async_trait::async_trait;
use mongodb::options::ClientOptions;
use mongodb::{
    Client, Collection, Database as MongoDatabase,
    bson::{self, DateTime, Document, doc},
};

use crate::config::CONFIG;
use crate::data_models::{
    AgentStatus, SearchRecord, SearchResults, SearchStatus, Stage,
};

/// Collection names as constants for consistency
pub mod collections {
    pub const SEARCHES: &str = "searches";
}

/// Main database wrapper providing connection management and collection access.
/// Constructed explicitly and passed to whoever needs it; there is no global
/// instance.
#[derive(Debug, Clone)]
pub struct Database {
    client: Client,
    db: MongoDatabase,
}

impl Database {
    /// Create a new Database instance with custom URI and database name.
    /// Useful for testing with a different database.
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        let client_options = ClientOptions::parse(uri)
            .await
            .context("Failed to parse MongoDB connection string")?;

        let client =
            Client::with_options(client_options).context("Failed to create MongoDB client")?;

        // Ping the database to verify connection
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .context("Failed to connect to MongoDB")?;

        log::info!("Connected to MongoDB database: {}", db_name);

        let db = client.database(db_name);

        Ok(Self { client, db })
    }

    /// Create a Database instance using environment configuration
    pub async fn from_config() -> Result<Self> {
        Self::new(&CONFIG.mongo_uri, &CONFIG.mongo_db_name).await
    }

    /// Get a typed collection by name
    pub fn collection<T>(&self, name: &str) -> Collection<T>
    where
        T: Send + Sync,
    {
        self.db.collection(name)
    }

    /// Get the underlying MongoDB client (for advanced operations)
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Get the underlying MongoDB database (for advanced operations)
    pub fn database(&self) -> &MongoDatabase {
        &self.db
    }

    /// Get the searches collection
    pub fn searches(&self) -> Collection<SearchRecord> {
        self.collection(collections::SEARCHES)
    }
}

/// Persistent record store boundary the orchestration core writes through.
///
/// Every call is individually atomic; `upsert_progress` touches only the stage
/// keys it is handed, so concurrent stages never clobber each other's entries.
#[async_trait]
pub trait SearchStore: Send + Sync {
    async fn create(&self, record: &SearchRecord) -> Result<()>;
    async fn find(&self, search_id: &str) -> Result<Option<SearchRecord>>;
    async fn upsert_progress(
        &self,
        search_id: &str,
        partial: &[(Stage, AgentStatus)],
    ) -> Result<()>;
    async fn set_status(
        &self,
        search_id: &str,
        status: SearchStatus,
        error: Option<&str>,
    ) -> Result<()>;
    async fn save_results(&self, search_id: &str, results: &SearchResults) -> Result<()>;
}

/// `SearchStore` backed by the searches collection.
pub struct MongoSearchStore {
    collection: Collection<SearchRecord>,
}

impl MongoSearchStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.searches(),
        }
    }

    async fn update(&self, search_id: &str, set: Document) -> Result<()> {
        self.collection
            .update_one(doc! { "search_id": search_id }, doc! { "$set": set })
            .await
            .context("Failed to update search record")?;
        Ok(())
    }
}

#[async_trait]
impl SearchStore for MongoSearchStore {
    async fn create(&self, record: &SearchRecord) -> Result<()> {
        self.collection
            .insert_one(record)
            .await
            .context("Failed to insert search record")?;
        Ok(())
    }

    async fn find(&self, search_id: &str) -> Result<Option<SearchRecord>> {
        self.collection
            .find_one(doc! { "search_id": search_id })
            .await
            .context("Failed to find search record")
    }

    async fn upsert_progress(
        &self,
        search_id: &str,
        partial: &[(Stage, AgentStatus)],
    ) -> Result<()> {
        // Dotted paths so only the named stage keys are written; everything
        // else in the progress map is left alone.
        let mut set = Document::new();
        for (stage, status) in partial {
            set.insert(format!("progress.{}", stage.as_str()), status.as_str());
        }
        set.insert("updated_at", DateTime::now());
        self.update(search_id, set).await
    }

    async fn set_status(
        &self,
        search_id: &str,
        status: SearchStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let mut set = doc! {
            "status": status.as_str(),
            "updated_at": DateTime::now(),
        };
        if let Some(message) = error {
            set.insert("error", message);
        }
        self.update(search_id, set).await
    }

    async fn save_results(&self, search_id: &str, results: &SearchResults) -> Result<()> {
        let results =
            bson::to_bson(results).context("Failed to serialize search results to BSON")?;
        self.update(
            search_id,
            doc! { "results": results, "updated_at": DateTime::now() },
        )
        .await
    }
}
