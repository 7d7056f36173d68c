//! Postgres-backed implementations of the five `workflow::store` traits.
//!
//! Each aggregate is persisted as a JSONB blob under its natural key, with a
//! handful of plain columns pulled out for the predicates each trait method
//! actually needs to filter or sort on (`patient_id`, `session_id`, `step`,
//! `active`, `status`). Reads deserialize the blob back into the `workflow`
//! model type directly — there is no separate row-to-struct mapping layer.

use crate::error::PostgresError;
use async_trait::async_trait;
use errors::EngineError;
use sqlx::{Pool, Postgres, Row};
use workflow::ids::{ApprovalRequestId, LockId, PatientId, SessionId, UserId};
use workflow::model::{ActivityLogEntry, ApprovalRequest, Session, SessionLock, Step, UserAccessGrant};
use workflow::store::{ActivityLogStore, ApprovalStore, GrantStore, LockStore, SessionStore};

#[derive(Clone)]
pub struct PostgresBackend {
    pool: Pool<Postgres>,
}

impl PostgresBackend {
    pub async fn new(connection_url: &str) -> Result<Self, PostgresError> {
        let pool = Pool::connect(connection_url).await?;
        Ok(Self { pool })
    }

    pub async fn initialize_schema(&self) -> Result<(), PostgresError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                session_id UUID PRIMARY KEY,
                patient_id TEXT NOT NULL,
                data JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_patient_id ON sessions(patient_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS activity_logs (
                log_id UUID PRIMARY KEY,
                session_id UUID NOT NULL,
                step TEXT,
                seq BIGSERIAL,
                data JSONB NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_activity_logs_session_id ON activity_logs(session_id, seq)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS approval_requests (
                request_id UUID PRIMARY KEY,
                session_id UUID NOT NULL,
                status TEXT NOT NULL,
                data JSONB NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_approval_requests_session_id ON approval_requests(session_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS session_locks (
                lock_id UUID PRIMARY KEY,
                session_id UUID NOT NULL,
                active BOOLEAN NOT NULL,
                data JSONB NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_session_locks_session_id ON session_locks(session_id, active)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS user_access_grants (
                user_id TEXT NOT NULL,
                session_id UUID NOT NULL,
                data JSONB NOT NULL,
                PRIMARY KEY (user_id, session_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for PostgresBackend {
    async fn insert(&self, session: Session) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO sessions (session_id, patient_id, data, updated_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(session.session_id.as_uuid())
        .bind(&session.patient_id)
        .bind(serde_json::to_value(&session).map_err(PostgresError::from)?)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;
        Ok(())
    }

    async fn get(&self, session_id: SessionId) -> Result<Session, EngineError> {
        let row = sqlx::query("SELECT data FROM sessions WHERE session_id = $1")
            .bind(session_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(PostgresError::from)?
            .ok_or_else(|| PostgresError::NotFound { resource: "session", id: session_id.to_string() })?;
        let data: serde_json::Value = row.get("data");
        serde_json::from_value(data).map_err(|e| PostgresError::from(e).into())
    }

    async fn update(&self, session: Session) -> Result<(), EngineError> {
        sqlx::query(
            "UPDATE sessions SET patient_id = $2, data = $3, updated_at = $4 WHERE session_id = $1",
        )
        .bind(session.session_id.as_uuid())
        .bind(&session.patient_id)
        .bind(serde_json::to_value(&session).map_err(PostgresError::from)?)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;
        Ok(())
    }

    async fn list_for_patient(&self, patient_id: &PatientId) -> Result<Vec<Session>, EngineError> {
        let rows = sqlx::query("SELECT data FROM sessions WHERE patient_id = $1")
            .bind(patient_id)
            .fetch_all(&self.pool)
            .await
            .map_err(PostgresError::from)?;
        rows.into_iter()
            .map(|row| {
                let data: serde_json::Value = row.get("data");
                serde_json::from_value(data).map_err(|e| PostgresError::from(e).into())
            })
            .collect()
    }
}

#[async_trait]
impl ActivityLogStore for PostgresBackend {
    async fn append(&self, entry: ActivityLogEntry) -> Result<(), EngineError> {
        sqlx::query("INSERT INTO activity_logs (log_id, session_id, step, data) VALUES ($1, $2, $3, $4)")
            .bind(entry.log_id.as_uuid())
            .bind(entry.session_id.as_uuid())
            .bind(entry.step.map(|s| s.to_string()))
            .bind(serde_json::to_value(&entry).map_err(PostgresError::from)?)
            .execute(&self.pool)
            .await
            .map_err(PostgresError::from)?;
        Ok(())
    }

    async fn list(
        &self,
        session_id: SessionId,
        step: Option<Step>,
    ) -> Result<Vec<ActivityLogEntry>, EngineError> {
        let rows = match step {
            Some(step) => {
                sqlx::query("SELECT data FROM activity_logs WHERE session_id = $1 AND step = $2 ORDER BY seq")
                    .bind(session_id.as_uuid())
                    .bind(step.to_string())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT data FROM activity_logs WHERE session_id = $1 ORDER BY seq")
                    .bind(session_id.as_uuid())
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(PostgresError::from)?;

        rows.into_iter()
            .map(|row| {
                let data: serde_json::Value = row.get("data");
                serde_json::from_value(data).map_err(|e| PostgresError::from(e).into())
            })
            .collect()
    }
}

#[async_trait]
impl ApprovalStore for PostgresBackend {
    async fn insert(&self, request: ApprovalRequest) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO approval_requests (request_id, session_id, status, data) VALUES ($1, $2, $3, $4)",
        )
        .bind(request.request_id.as_uuid())
        .bind(request.session_id.as_uuid())
        .bind(request.status.to_string())
        .bind(serde_json::to_value(&request).map_err(PostgresError::from)?)
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;
        Ok(())
    }

    async fn get(&self, request_id: ApprovalRequestId) -> Result<ApprovalRequest, EngineError> {
        let row = sqlx::query("SELECT data FROM approval_requests WHERE request_id = $1")
            .bind(request_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(PostgresError::from)?
            .ok_or_else(|| PostgresError::NotFound { resource: "approval_request", id: request_id.to_string() })?;
        let data: serde_json::Value = row.get("data");
        serde_json::from_value(data).map_err(|e| PostgresError::from(e).into())
    }

    async fn update(&self, request: ApprovalRequest) -> Result<(), EngineError> {
        sqlx::query("UPDATE approval_requests SET status = $2, data = $3 WHERE request_id = $1")
            .bind(request.request_id.as_uuid())
            .bind(request.status.to_string())
            .bind(serde_json::to_value(&request).map_err(PostgresError::from)?)
            .execute(&self.pool)
            .await
            .map_err(PostgresError::from)?;
        Ok(())
    }

    async fn list_pending_for_session(&self, session_id: SessionId) -> Result<Vec<ApprovalRequest>, EngineError> {
        let rows = sqlx::query(
            "SELECT data FROM approval_requests WHERE session_id = $1 AND status = 'pending'",
        )
        .bind(session_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(PostgresError::from)?;
        rows.into_iter()
            .map(|row| {
                let data: serde_json::Value = row.get("data");
                serde_json::from_value(data).map_err(|e| PostgresError::from(e).into())
            })
            .collect()
    }
}

#[async_trait]
impl LockStore for PostgresBackend {
    async fn insert(&self, lock: SessionLock) -> Result<(), EngineError> {
        sqlx::query("INSERT INTO session_locks (lock_id, session_id, active, data) VALUES ($1, $2, $3, $4)")
            .bind(lock.lock_id.as_uuid())
            .bind(lock.session_id.as_uuid())
            .bind(lock.active)
            .bind(serde_json::to_value(&lock).map_err(PostgresError::from)?)
            .execute(&self.pool)
            .await
            .map_err(PostgresError::from)?;
        Ok(())
    }

    async fn get(&self, lock_id: LockId) -> Result<SessionLock, EngineError> {
        let row = sqlx::query("SELECT data FROM session_locks WHERE lock_id = $1")
            .bind(lock_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(PostgresError::from)?
            .ok_or_else(|| PostgresError::NotFound { resource: "session_lock", id: lock_id.to_string() })?;
        let data: serde_json::Value = row.get("data");
        serde_json::from_value(data).map_err(|e| PostgresError::from(e).into())
    }

    async fn update(&self, lock: SessionLock) -> Result<(), EngineError> {
        sqlx::query("UPDATE session_locks SET active = $2, data = $3 WHERE lock_id = $1")
            .bind(lock.lock_id.as_uuid())
            .bind(lock.active)
            .bind(serde_json::to_value(&lock).map_err(PostgresError::from)?)
            .execute(&self.pool)
            .await
            .map_err(PostgresError::from)?;
        Ok(())
    }

    async fn list_active_for_session(&self, session_id: SessionId) -> Result<Vec<SessionLock>, EngineError> {
        let rows = sqlx::query("SELECT data FROM session_locks WHERE session_id = $1 AND active = true")
            .bind(session_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(PostgresError::from)?;
        rows.into_iter()
            .map(|row| {
                let data: serde_json::Value = row.get("data");
                serde_json::from_value(data).map_err(|e| PostgresError::from(e).into())
            })
            .collect()
    }
}

#[async_trait]
impl GrantStore for PostgresBackend {
    async fn upsert(&self, grant: UserAccessGrant) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO user_access_grants (user_id, session_id, data) VALUES ($1, $2, $3)
             ON CONFLICT (user_id, session_id) DO UPDATE SET data = EXCLUDED.data",
        )
        .bind(&grant.user_id)
        .bind(grant.session_id.as_uuid())
        .bind(serde_json::to_value(&grant).map_err(PostgresError::from)?)
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;
        Ok(())
    }

    async fn get(&self, user_id: &UserId, session_id: SessionId) -> Result<Option<UserAccessGrant>, EngineError> {
        let row = sqlx::query("SELECT data FROM user_access_grants WHERE user_id = $1 AND session_id = $2")
            .bind(user_id)
            .bind(session_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(PostgresError::from)?;
        match row {
            Some(row) => {
                let data: serde_json::Value = row.get("data");
                Ok(Some(serde_json::from_value(data).map_err(PostgresError::from)?))
            }
            None => Ok(None),
        }
    }
}
