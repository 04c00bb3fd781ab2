// Shared types and the error taxonomy for the function runtime core.
//
// This crate has no dependency on Docker, HTTP, or a database driver: it is
// the vocabulary the executor and gateway crates agree on.

use std::fmt;

pub use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The stable, machine-readable failure taxonomy shared across the core.
///
/// Every fallible operation on the dispatch path returns one of these
/// variants rather than a bare `anyhow::Error`, so the gateway can map a
/// failure to an HTTP response without inspecting its message.
#[derive(Error, Debug)]
pub enum FaasError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("docker error: {0}")]
    Docker(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Catch-all for failures the taxonomy above does not anticipate (e.g. a
    /// panic caught at the HTTP boundary). Never returned by name from a
    /// component; only synthesized at the gateway's outermost layer.
    #[error("unknown error: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, FaasError>;

/// Lifecycle state of a function record as read from the metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FunctionState {
    Active,
    Deleted,
}

impl FunctionState {
    pub fn is_dispatchable(self) -> bool {
        matches!(self, FunctionState::Active)
    }
}

/// Trigger that invokes a function. Only `Http` is dispatchable by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Http,
    Cron,
}

/// Execution type of a function. Only `Rest` is implemented by the core;
/// `Single` is reserved and must fail with `NotImplemented`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FunctionType {
    Rest,
    Single,
}

/// Configuration embedded in a `FunctionRecord`, carried verbatim as the
/// `configuration` JSON column of `functions_tb`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionConfig {
    pub trigger: Trigger,
    #[serde(rename = "type")]
    pub func_type: FunctionType,
    pub image: String,
    pub port: Option<u16>,
    #[serde(default)]
    pub env_vars: std::collections::HashMap<String, String>,
}

/// Read-only view of a function as resolved by the Metadata Port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub external_id: String,
    pub state: FunctionState,
    pub config: FunctionConfig,
}

impl fmt::Display for FunctionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionRecord(id={}, state={:?})", self.external_id, self.state)
    }
}
