//! Request Gateway: the per-request pipeline (metadata resolve, dispatch,
//! reverse proxy), the Activity Tracker, the Idle Reaper, and the error
//! taxonomy's HTTP mapping.

pub mod activity;
pub mod config;
pub mod error;
pub mod gateway;
pub mod metadata;
pub mod path;
pub mod proxy;
pub mod reaper;

pub use activity::ActivityTracker;
pub use config::GatewayConfig;
pub use error::ApiError;
pub use gateway::{router, GatewayState};
pub use metadata::{InMemoryMetadataStore, MetadataPort, PostgresMetadataStore};
pub use reaper::IdleReaper;
