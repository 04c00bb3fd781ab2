//! Metadata Port: read-only view of function records, backed in production
//! by the `functions_tb` table and by an in-memory map in tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use faas_common::{FaasError, FunctionConfig, FunctionRecord, FunctionState, Result};
use sqlx::PgPool;
use sqlx::Row;

/// Read-only access to function records, consumed by the Gateway (single
/// lookup) and the Idle Reaper (`list_active`).
#[async_trait]
pub trait MetadataPort: Send + Sync {
    async fn get(&self, external_id: &str) -> Result<FunctionRecord>;

    /// Never returns an error condition as "no active functions"; an empty
    /// sequence is a valid, non-error result.
    async fn list_active(&self) -> Result<Vec<String>>;
}

/// Production implementation querying `functions_tb` through `sqlx`.
pub struct PostgresMetadataStore {
    pool: PgPool,
}

impl PostgresMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataPort for PostgresMetadataStore {
    async fn get(&self, external_id: &str) -> Result<FunctionRecord> {
        let row = sqlx::query(
            "SELECT external_id, state, configuration FROM functions_tb WHERE external_id = $1",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| FaasError::Internal(format!("metadata query failed: {e}")))?
        .ok_or_else(|| FaasError::NotFound(format!("no such function: {external_id}")))?;

        row_to_record(row)
    }

    async fn list_active(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT external_id, state, configuration FROM functions_tb WHERE state = 'ACTIVE'",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FaasError::Internal(format!("metadata query failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|r| r.get::<String, _>("external_id"))
            .collect())
    }
}

fn row_to_record(row: sqlx::postgres::PgRow) -> Result<FunctionRecord> {
    let external_id: String = row.get("external_id");
    let state_raw: String = row.get("state");
    let config_json: serde_json::Value = row.get("configuration");

    let state = match state_raw.as_str() {
        "ACTIVE" => FunctionState::Active,
        "DELETED" => FunctionState::Deleted,
        other => {
            return Err(FaasError::Internal(format!(
                "unrecognized function state: {other}"
            )))
        }
    };

    let config: FunctionConfig = serde_json::from_value(config_json)
        .map_err(|e| FaasError::Internal(format!("malformed function configuration: {e}")))?;

    Ok(FunctionRecord {
        external_id,
        state,
        config,
    })
}

/// In-memory stand-in used by tests and by the in-process round-trip
/// scenarios; never talks to a database.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    records: Mutex<HashMap<String, FunctionRecord>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: FunctionRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.external_id.clone(), record);
    }
}

#[async_trait]
impl MetadataPort for InMemoryMetadataStore {
    async fn get(&self, external_id: &str) -> Result<FunctionRecord> {
        self.records
            .lock()
            .unwrap()
            .get(external_id)
            .cloned()
            .ok_or_else(|| FaasError::NotFound(format!("no such function: {external_id}")))
    }

    async fn list_active(&self) -> Result<Vec<String>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.state.is_dispatchable())
            .map(|r| r.external_id.clone())
            .collect())
    }
}
