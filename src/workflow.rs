use std::sync::Arc;

use anyhow::Result;

use crate::agents::{ActivityAgent, AggregateAgent, DiningAgent, LodgingAgent, PlanAgent};
use crate::data_models::{
    ActivityResult, AgentStatus, DiningResult, LodgingResult, SearchInput, SearchOutcome,
    SearchPlan, SearchResults, SearchStatus, Stage,
};
use crate::db::SearchStore;
use crate::genai::Generative;

/// How many results each provider is asked for.
pub const RESULTS_PER_CATEGORY: usize = 10;

/// Orchestrates one search end to end: derive the plan, fan out to the three
/// providers, fold the results into an itinerary, persist.
///
/// Every stage is safe to re-execute at-least-once: stage functions are pure
/// apart from their generative/store calls, progress writes are idempotent
/// merges, and a provider re-run replaces its prior output wholesale (ids are
/// freshly generated each invocation, never appended to).
pub struct SearchWorkflow {
    store: Arc<dyn SearchStore>,
    plan_agent: PlanAgent,
    lodging_agent: LodgingAgent,
    activity_agent: ActivityAgent,
    dining_agent: DiningAgent,
    aggregate_agent: AggregateAgent,
}

impl SearchWorkflow {
    pub fn new(generator: Arc<dyn Generative>, store: Arc<dyn SearchStore>) -> SearchWorkflow {
        SearchWorkflow {
            store,
            plan_agent: PlanAgent::new(generator.clone()),
            lodging_agent: LodgingAgent::new(generator.clone()),
            activity_agent: ActivityAgent::new(generator.clone()),
            dining_agent: DiningAgent::new(generator.clone()),
            aggregate_agent: AggregateAgent::new(generator),
        }
    }

    /// Run the whole search. Always resolves to a terminal outcome; generation
    /// failures degrade the result instead of failing it, and only store
    /// failures surface as an error status.
    pub async fn run_search(&self, search_id: &str, input: SearchInput) -> SearchOutcome {
        log::info!("starting search {search_id} for {}", input.destination);
        match self.run_inner(search_id, &input).await {
            Ok(results) => {
                log::info!(
                    "search {search_id} completed with {} itinerary day(s)",
                    results.itinerary.len()
                );
                SearchOutcome::completed(results)
            }
            Err(e) => {
                let message = format!("{e:#}");
                log::error!("search {search_id} failed: {message}");
                if let Err(store_err) = self
                    .store
                    .set_status(search_id, SearchStatus::Error, Some(&message))
                    .await
                {
                    log::error!("could not record failure for {search_id}: {store_err:#}");
                }
                SearchOutcome::error(message)
            }
        }
    }

    async fn run_inner(&self, search_id: &str, input: &SearchInput) -> Result<SearchResults> {
        self.store
            .set_status(search_id, SearchStatus::Searching, None)
            .await?;

        self.store
            .upsert_progress(search_id, &[(Stage::Plan, AgentStatus::Searching)])
            .await?;
        let plan = self.plan_agent.derive(input).await;
        self.store
            .upsert_progress(search_id, &[(Stage::Plan, AgentStatus::Done)])
            .await?;

        let (lodging, activities, dining) = self.run_providers(search_id, &plan).await?;

        self.store
            .upsert_progress(search_id, &[(Stage::Aggregate, AgentStatus::Searching)])
            .await?;
        let aggregated = self
            .aggregate_agent
            .aggregate(&plan, &lodging, &activities, &dining)
            .await;
        self.store
            .upsert_progress(search_id, &[(Stage::Aggregate, AgentStatus::Done)])
            .await?;

        let results = SearchResults {
            plan,
            lodging,
            activities,
            dining,
            itinerary: aggregated.days,
            chosen_lodging: aggregated.chosen_lodging,
            degraded: aggregated.degraded,
        };

        self.store.save_results(search_id, &results).await?;
        self.store
            .set_status(search_id, SearchStatus::Completed, None)
            .await?;

        Ok(results)
    }

    /// Fan the plan out to all three providers concurrently and wait for every
    /// one of them to settle. A provider coming back empty is still success
    /// here; the stage goes `done` either way. Only store errors bubble up.
    async fn run_providers(
        &self,
        search_id: &str,
        plan: &SearchPlan,
    ) -> Result<(Vec<LodgingResult>, Vec<ActivityResult>, Vec<DiningResult>)> {
        let lodging_branch = async {
            self.store
                .upsert_progress(search_id, &[(Stage::Lodging, AgentStatus::Searching)])
                .await?;
            let items = self.lodging_agent.search(plan, RESULTS_PER_CATEGORY).await;
            self.store
                .upsert_progress(search_id, &[(Stage::Lodging, AgentStatus::Done)])
                .await?;
            anyhow::Ok(items)
        };

        let activity_branch = async {
            self.store
                .upsert_progress(search_id, &[(Stage::Activity, AgentStatus::Searching)])
                .await?;
            let items = self.activity_agent.search(plan, RESULTS_PER_CATEGORY).await;
            self.store
                .upsert_progress(search_id, &[(Stage::Activity, AgentStatus::Done)])
                .await?;
            anyhow::Ok(items)
        };

        let dining_branch = async {
            self.store
                .upsert_progress(search_id, &[(Stage::Dining, AgentStatus::Searching)])
                .await?;
            let items = self.dining_agent.search(plan, RESULTS_PER_CATEGORY).await;
            self.store
                .upsert_progress(search_id, &[(Stage::Dining, AgentStatus::Done)])
                .await?;
            anyhow::Ok(items)
        };

        // join, not try_join: all three must settle before we move on
        let (lodging, activities, dining) =
            tokio::join!(lodging_branch, activity_branch, dining_branch);

        Ok((lodging?, activities?, dining?))
    }
}
