pub mod activity;
pub mod aggregate;
pub mod dining;
pub mod lodging;
pub mod plan;

pub use activity::ActivityAgent;
pub use aggregate::{AggregateAgent, AggregatedItinerary, compose_fallback};
pub use dining::DiningAgent;
pub use lodging::LodgingAgent;
pub use plan::PlanAgent;
