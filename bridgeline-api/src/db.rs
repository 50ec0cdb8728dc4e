//! PostgreSQL Pairing Store
//!
//! Connection pool configuration and a [`PairingStore`] backed by a single
//! `bridgeline_agents` table. The claim runs as one `UPDATE` over a row
//! locked with `FOR UPDATE`, so concurrent claims on the same record
//! serialize and only the first one sees the pairing.

use std::time::Duration;

use ::async_trait::async_trait;
use bridgeline_core::{
    AgentId, AgentRecord, BridgelineResult, CallMetadata, LegId, Pairing, PairingKey,
    StorageError, Timestamp,
};
use bridgeline_storage::{ClaimOutcome, PairingStore};
use deadpool_postgres::{Config, ManagerConfig, Object, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::{NoTls, Row};

use crate::error::{storage_error, ApiError, ApiResult};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "bridgeline".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("BRIDGELINE_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("BRIDGELINE_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("BRIDGELINE_DB_NAME")
                .unwrap_or_else(|_| "bridgeline".to_string()),
            user: std::env::var("BRIDGELINE_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("BRIDGELINE_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("BRIDGELINE_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("BRIDGELINE_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        pool_cfg.timeouts.create = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::store_unavailable(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("max_size", &self.max_size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS bridgeline_agents (
    agent_id            TEXT PRIMARY KEY,
    push_token          TEXT,
    pairing_key         TEXT,
    pending_leg_id      TEXT,
    pairing_expires_at  TIMESTAMPTZ,
    last_inbound_call   JSONB,
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS bridgeline_agents_pairing_key_idx
    ON bridgeline_agents (pairing_key)
    WHERE pairing_key IS NOT NULL;
"#;

const RECORD_COLUMNS: &str =
    "agent_id, push_token, pairing_key, pending_leg_id, pairing_expires_at, last_inbound_call";

const CLAIM_SQL: &str = r#"
UPDATE bridgeline_agents AS a
SET pairing_key = NULL,
    pending_leg_id = NULL,
    pairing_expires_at = NULL,
    updated_at = now()
FROM (
    SELECT agent_id, pending_leg_id, pairing_expires_at
    FROM bridgeline_agents
    WHERE agent_id = $1 AND pairing_key = $2 AND pending_leg_id IS NOT NULL
    FOR UPDATE
) AS old
WHERE a.agent_id = old.agent_id
RETURNING old.pending_leg_id, old.pairing_expires_at
"#;

// ============================================================================
// STORE
// ============================================================================

/// Pairing store backed by PostgreSQL.
#[derive(Clone)]
pub struct PgPairingStore {
    pool: Pool,
}

impl PgPairingStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create the agents table and its pairing-key index if missing.
    pub async fn bootstrap(&self) -> BridgelineResult<()> {
        let client = self.client().await?;
        client
            .batch_execute(SCHEMA)
            .await
            .map_err(|e| storage_error("Schema bootstrap failed", e))?;
        tracing::info!("Pairing store schema ready");
        Ok(())
    }

    async fn client(&self) -> BridgelineResult<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| storage_error("Failed to acquire database connection", e))
    }
}

fn corrupt(agent_id: &str, err: impl std::fmt::Display) -> StorageError {
    StorageError::CorruptRecord {
        agent_id: agent_id.to_string(),
        reason: err.to_string(),
    }
}

fn record_from_row(row: &Row) -> BridgelineResult<AgentRecord> {
    let agent_id: String = row
        .try_get("agent_id")
        .map_err(|e| corrupt("<unknown>", e))?;
    let column_err = |e: tokio_postgres::Error| corrupt(&agent_id, e);

    let push_token: Option<String> = row.try_get("push_token").map_err(column_err)?;
    let pairing_key: Option<String> = row.try_get("pairing_key").map_err(column_err)?;
    let pending_leg_id: Option<String> = row.try_get("pending_leg_id").map_err(column_err)?;
    let pairing_expires_at = row.try_get("pairing_expires_at").map_err(column_err)?;
    let last_inbound_call: Option<serde_json::Value> =
        row.try_get("last_inbound_call").map_err(column_err)?;

    let last_inbound_call = last_inbound_call
        .map(serde_json::from_value::<CallMetadata>)
        .transpose()
        .map_err(|e| corrupt(&agent_id, e))?;

    Ok(AgentRecord {
        agent_id: AgentId::new(agent_id),
        push_token,
        pairing_key: pairing_key.map(PairingKey::new),
        pending_leg_id: pending_leg_id.map(LegId::new),
        pairing_expires_at,
        last_inbound_call,
    })
}

fn write_failed(agent_id: &AgentId, err: impl std::fmt::Display) -> StorageError {
    StorageError::WriteFailed {
        agent_id: agent_id.to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl PairingStore for PgPairingStore {
    async fn get(&self, agent_id: &AgentId) -> BridgelineResult<Option<AgentRecord>> {
        let client = self.client().await?;
        let sql = format!(
            "SELECT {} FROM bridgeline_agents WHERE agent_id = $1",
            RECORD_COLUMNS
        );
        let row = client
            .query_opt(sql.as_str(), &[&agent_id.as_str()])
            .await
            .map_err(|e| storage_error("Agent lookup failed", e))?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn find_by_pairing_key(&self, key: &PairingKey) -> BridgelineResult<Option<AgentRecord>> {
        let client = self.client().await?;
        let sql = format!(
            "SELECT {} FROM bridgeline_agents WHERE pairing_key = $1 ORDER BY agent_id LIMIT 2",
            RECORD_COLUMNS
        );
        let rows = client
            .query(sql.as_str(), &[&key.as_str()])
            .await
            .map_err(|e| StorageError::QueryFailed {
                index_name: "bridgeline_agents_pairing_key_idx".to_string(),
                reason: e.to_string(),
            })?;

        if rows.len() > 1 {
            tracing::warn!(
                pairing_key = %key,
                "Pairing key held by more than one record, using the first"
            );
        }
        rows.first().map(record_from_row).transpose()
    }

    async fn claim_and_clear(
        &self,
        agent_id: &AgentId,
        expected: &PairingKey,
    ) -> BridgelineResult<ClaimOutcome> {
        let client = self.client().await?;
        let claimed = client
            .query_opt(CLAIM_SQL, &[&agent_id.as_str(), &expected.as_str()])
            .await
            .map_err(|e| StorageError::TransactionFailed {
                reason: e.to_string(),
            })?;

        if let Some(row) = claimed {
            let leg: String = row
                .try_get("pending_leg_id")
                .map_err(|e| corrupt(agent_id.as_str(), e))?;
            let expires_at: Option<Timestamp> = row
                .try_get("pairing_expires_at")
                .map_err(|e| corrupt(agent_id.as_str(), e))?;
            return Ok(ClaimOutcome::claimed(LegId::new(leg), expires_at));
        }

        let exists = client
            .query_opt(
                "SELECT 1 FROM bridgeline_agents WHERE agent_id = $1",
                &[&agent_id.as_str()],
            )
            .await
            .map_err(|e| storage_error("Agent lookup failed", e))?
            .is_some();

        Ok(if exists {
            ClaimOutcome::Conflict
        } else {
            ClaimOutcome::NotFound
        })
    }

    async fn set_pairing(&self, agent_id: &AgentId, pairing: &Pairing) -> BridgelineResult<()> {
        let client = self.client().await?;
        client
            .execute(
                r#"
                INSERT INTO bridgeline_agents (agent_id, pairing_key, pending_leg_id, pairing_expires_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (agent_id) DO UPDATE
                SET pairing_key = EXCLUDED.pairing_key,
                    pending_leg_id = EXCLUDED.pending_leg_id,
                    pairing_expires_at = EXCLUDED.pairing_expires_at,
                    updated_at = now()
                "#,
                &[
                    &agent_id.as_str(),
                    &pairing.key.as_str(),
                    &pairing.pending_leg_id.as_str(),
                    &pairing.expires_at,
                ],
            )
            .await
            .map_err(|e| write_failed(agent_id, e))?;
        Ok(())
    }

    async fn set_last_inbound_call(
        &self,
        agent_id: &AgentId,
        metadata: &CallMetadata,
    ) -> BridgelineResult<()> {
        let value = serde_json::to_value(metadata).map_err(|e| write_failed(agent_id, e))?;
        let client = self.client().await?;
        client
            .execute(
                r#"
                INSERT INTO bridgeline_agents (agent_id, last_inbound_call)
                VALUES ($1, $2)
                ON CONFLICT (agent_id) DO UPDATE
                SET last_inbound_call = EXCLUDED.last_inbound_call,
                    updated_at = now()
                "#,
                &[&agent_id.as_str(), &value],
            )
            .await
            .map_err(|e| write_failed(agent_id, e))?;
        Ok(())
    }

    async fn set_push_token(&self, agent_id: &AgentId, token: &str) -> BridgelineResult<()> {
        let client = self.client().await?;
        client
            .execute(
                r#"
                INSERT INTO bridgeline_agents (agent_id, push_token)
                VALUES ($1, $2)
                ON CONFLICT (agent_id) DO UPDATE
                SET push_token = EXCLUDED.push_token,
                    updated_at = now()
                "#,
                &[&agent_id.as_str(), &token],
            )
            .await
            .map_err(|e| write_failed(agent_id, e))?;
        Ok(())
    }

    async fn health_check(&self) -> BridgelineResult<bool> {
        let client = self.client().await?;
        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| storage_error("Health check failed", e))?;
        Ok(true)
    }
}
