//! Monte Carlo Provider
//!
//! An infrastructure-as-code provider for the Monte Carlo data observability
//! platform. A plugin host drives it one resource operation at a time through
//! [`ProviderService`]; the provider reconciles the desired state with the
//! platform through its GraphQL API.
//!
//! # Overview
//!
//! - **Resources**: BigQuery and transactional warehouses, domains, IAM
//!   groups and members, service accounts, comparison monitors
//! - **Data sources**: `montecarlo_warehouse`, every table of a warehouse
//! - **Client**: the [`MonteCarloClient`] seam and its HTTPS implementation
//! - **Warehouse provisioning**: the two-step test-then-attach connection flow
//! - **Schema types**: schemas, validation and schema-driven planning
//! - **Logging**: Integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```ignore
//! use montecarlo_provider::{MonteCarloProvider, ProviderService};
//! use serde_json::json;
//!
//! let provider = MonteCarloProvider::new();
//! provider
//!     .configure(json!({"account_service_key": {"id": "...", "token": "..."}}))
//!     .await?;
//!
//! let planned = provider
//!     .plan("montecarlo_domain", None, json!({"name": "finance"}), json!({}))
//!     .await?
//!     .planned_state;
//! let applied = provider.create("montecarlo_domain", planned).await?;
//! println!("created domain {}", applied.state["uuid"]);
//! ```
//!
//! # Configuration
//!
//! | attribute | environment fallback | default |
//! |---|---|---|
//! | `account_service_key.id` | `MC_API_KEY_ID` | required |
//! | `account_service_key.token` | `MC_API_KEY_TOKEN` | required |
//! | `api_url` | `MC_API_URL` | `https://api.getmontecarlo.com/graphql` |
//!
//! # Outcomes
//!
//! Fatal problems are [`ProviderError`]s. Objects that are already gone on
//! delete, or missing on read, are warnings next to a successful result: a
//! [`ReadResult`] without state tells the host to drop the resource.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod data_sources;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod testing;
pub mod types;
pub mod validation;
pub mod warehouse;

// Re-export main types at crate root
pub use client::{HttpMonteCarloClient, MonteCarloClient, MonteCarloClientExt};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{MonteCarloProvider, ProviderConfig, ProviderService};
pub use schema::ProviderSchema;
pub use types::{
    Applied, AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ReadResult,
};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
