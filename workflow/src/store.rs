//! Storage seams for the engine.
//!
//! Each trait covers one aggregate. `storage::postgres` implements all five
//! against a real database; the `InMemory*` types here back tests and
//! single-process/offline deployments. Traits are `async` even for the
//! in-memory case so callers never need to know which backend they're
//! talking to.

use crate::ids::{ApprovalRequestId, LockId, LogId, PatientId, SessionId, UserId};
use crate::model::{ActivityLogEntry, ApprovalRequest, Session, SessionLock, UserAccessGrant};
use async_trait::async_trait;
use dashmap::DashMap;
use errors::EngineError;
use std::sync::Arc;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: Session) -> Result<(), EngineError>;
    async fn get(&self, session_id: SessionId) -> Result<Session, EngineError>;
    async fn update(&self, session: Session) -> Result<(), EngineError>;
    async fn list_for_patient(&self, patient_id: &PatientId) -> Result<Vec<Session>, EngineError>;
}

#[async_trait]
pub trait ActivityLogStore: Send + Sync {
    async fn append(&self, entry: ActivityLogEntry) -> Result<(), EngineError>;
    /// Entries for a session in append order, optionally filtered to one
    /// step, newest-last.
    async fn list(
        &self,
        session_id: SessionId,
        step: Option<crate::model::Step>,
    ) -> Result<Vec<ActivityLogEntry>, EngineError>;
}

#[async_trait]
pub trait ApprovalStore: Send + Sync {
    async fn insert(&self, request: ApprovalRequest) -> Result<(), EngineError>;
    async fn get(&self, request_id: ApprovalRequestId) -> Result<ApprovalRequest, EngineError>;
    async fn update(&self, request: ApprovalRequest) -> Result<(), EngineError>;
    async fn list_pending_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<ApprovalRequest>, EngineError>;
}

#[async_trait]
pub trait LockStore: Send + Sync {
    async fn insert(&self, lock: SessionLock) -> Result<(), EngineError>;
    async fn get(&self, lock_id: LockId) -> Result<SessionLock, EngineError>;
    async fn update(&self, lock: SessionLock) -> Result<(), EngineError>;
    async fn list_active_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<SessionLock>, EngineError>;
}

#[async_trait]
pub trait GrantStore: Send + Sync {
    async fn upsert(&self, grant: UserAccessGrant) -> Result<(), EngineError>;
    async fn get(
        &self,
        user_id: &UserId,
        session_id: SessionId,
    ) -> Result<Option<UserAccessGrant>, EngineError>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<SessionId, Session>,
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: Session) -> Result<(), EngineError> {
        self.sessions.insert(session.session_id, session);
        Ok(())
    }

    async fn get(&self, session_id: SessionId) -> Result<Session, EngineError> {
        self.sessions
            .get(&session_id)
            .map(|s| s.clone())
            .ok_or_else(|| EngineError::not_found("session", session_id.to_string()))
    }

    async fn update(&self, session: Session) -> Result<(), EngineError> {
        self.sessions.insert(session.session_id, session);
        Ok(())
    }

    async fn list_for_patient(&self, patient_id: &PatientId) -> Result<Vec<Session>, EngineError> {
        Ok(self
            .sessions
            .iter()
            .filter(|entry| &entry.patient_id == patient_id)
            .map(|entry| entry.clone())
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryActivityLogStore {
    entries: DashMap<SessionId, Vec<ActivityLogEntry>>,
}

impl InMemoryActivityLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActivityLogStore for InMemoryActivityLogStore {
    async fn append(&self, entry: ActivityLogEntry) -> Result<(), EngineError> {
        self.entries.entry(entry.session_id).or_default().push(entry);
        Ok(())
    }

    async fn list(
        &self,
        session_id: SessionId,
        step: Option<crate::model::Step>,
    ) -> Result<Vec<ActivityLogEntry>, EngineError> {
        let entries = self.entries.get(&session_id).map(|v| v.clone()).unwrap_or_default();
        Ok(match step {
            Some(step) => entries.into_iter().filter(|e| e.step == Some(step)).collect(),
            None => entries,
        })
    }
}

#[derive(Default)]
pub struct InMemoryApprovalStore {
    requests: DashMap<ApprovalRequestId, ApprovalRequest>,
}

#[async_trait]
impl ApprovalStore for InMemoryApprovalStore {
    async fn insert(&self, request: ApprovalRequest) -> Result<(), EngineError> {
        self.requests.insert(request.request_id, request);
        Ok(())
    }

    async fn get(&self, request_id: ApprovalRequestId) -> Result<ApprovalRequest, EngineError> {
        self.requests
            .get(&request_id)
            .map(|r| r.clone())
            .ok_or_else(|| EngineError::not_found("approval_request", request_id.to_string()))
    }

    async fn update(&self, request: ApprovalRequest) -> Result<(), EngineError> {
        self.requests.insert(request.request_id, request);
        Ok(())
    }

    async fn list_pending_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<ApprovalRequest>, EngineError> {
        Ok(self
            .requests
            .iter()
            .filter(|entry| {
                entry.session_id == session_id
                    && entry.status == crate::model::ApprovalStatus::Pending
            })
            .map(|entry| entry.clone())
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryLockStore {
    locks: DashMap<LockId, SessionLock>,
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn insert(&self, lock: SessionLock) -> Result<(), EngineError> {
        self.locks.insert(lock.lock_id, lock);
        Ok(())
    }

    async fn get(&self, lock_id: LockId) -> Result<SessionLock, EngineError> {
        self.locks
            .get(&lock_id)
            .map(|l| l.clone())
            .ok_or_else(|| EngineError::not_found("session_lock", lock_id.to_string()))
    }

    async fn update(&self, lock: SessionLock) -> Result<(), EngineError> {
        self.locks.insert(lock.lock_id, lock);
        Ok(())
    }

    async fn list_active_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<SessionLock>, EngineError> {
        Ok(self
            .locks
            .iter()
            .filter(|entry| entry.session_id == session_id && entry.active)
            .map(|entry| entry.clone())
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryGrantStore {
    grants: DashMap<(UserId, SessionId), UserAccessGrant>,
}

#[async_trait]
impl GrantStore for InMemoryGrantStore {
    async fn upsert(&self, grant: UserAccessGrant) -> Result<(), EngineError> {
        self.grants.insert((grant.user_id.clone(), grant.session_id), grant);
        Ok(())
    }

    async fn get(
        &self,
        user_id: &UserId,
        session_id: SessionId,
    ) -> Result<Option<UserAccessGrant>, EngineError> {
        Ok(self.grants.get(&(user_id.clone(), session_id)).map(|g| g.clone()))
    }
}

/// Bundles the five in-memory stores behind `Arc` so a `WorkflowEngine`
/// (or a test) can cheaply clone the whole backend.
#[derive(Clone)]
pub struct InMemoryBackend {
    pub sessions: Arc<InMemorySessionStore>,
    pub activity_log: Arc<InMemoryActivityLogStore>,
    pub approvals: Arc<InMemoryApprovalStore>,
    pub locks: Arc<InMemoryLockStore>,
    pub grants: Arc<InMemoryGrantStore>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(InMemorySessionStore::default()),
            activity_log: Arc::new(InMemoryActivityLogStore::default()),
            approvals: Arc::new(InMemoryApprovalStore::default()),
            locks: Arc::new(InMemoryLockStore::default()),
            grants: Arc::new(InMemoryGrantStore::default()),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ApprovalPriority, ApprovalStatus, Step};
    use chrono::Utc;

    fn sample_request(session_id: SessionId) -> ApprovalRequest {
        ApprovalRequest {
            request_id: ApprovalRequestId::new(),
            session_id,
            step: Step::Prescription,
            requester_id: "u1".to_string(),
            requester_name: "A".to_string(),
            requested_at: Utc::now(),
            approval_type: "step_completion".to_string(),
            reason: "routine".to_string(),
            data_snapshot: serde_json::json!({}),
            status: ApprovalStatus::Pending,
            approver_id: None,
            approver_name: None,
            approved_at: None,
            rejection_reason: None,
            priority: ApprovalPriority::Normal,
            expires_at: Utc::now() + chrono::Duration::hours(24),
        }
    }

    #[tokio::test]
    async fn approval_store_lists_only_pending_for_session() {
        let store = InMemoryApprovalStore::default();
        let session_id = SessionId::new();
        let mut request = sample_request(session_id);
        store.insert(request.clone()).await.unwrap();

        let pending = store.list_pending_for_session(session_id).await.unwrap();
        assert_eq!(pending.len(), 1);

        request.status = ApprovalStatus::Approved;
        store.update(request).await.unwrap();
        let pending = store.list_pending_for_session(session_id).await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn grant_store_keys_by_user_and_session() {
        let store = InMemoryGrantStore::default();
        let session_a = SessionId::new();
        let session_b = SessionId::new();
        let grant = UserAccessGrant {
            user_id: "u1".to_string(),
            session_id: session_a,
            role: crate::model::Role::RegistrationStaff,
            allowed_steps: Default::default(),
            permissions: Default::default(),
            granted_at: Utc::now(),
            expires_at: None,
            active: true,
        };
        store.upsert(grant).await.unwrap();

        assert!(store.get(&"u1".to_string(), session_a).await.unwrap().is_some());
        assert!(store.get(&"u1".to_string(), session_b).await.unwrap().is_none());
    }
}
