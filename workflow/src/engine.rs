//! The `WorkflowEngine` coordinator: the one place that validates a
//! mutation against permissions, current state, locks, and pending
//! approvals, then atomically updates the Session Store and appends to the
//! Activity Log Store.

use crate::clock::Clock;
use crate::ids::{ApprovalRequestId, LockId, PatientId, SessionId, UserId};
use crate::identity::Identity;
use crate::lock_registry::{SessionLockError, SessionLockRegistry};
use crate::model::{
    derive_overall_status, Action, ActivityLogEntry, ApprovalPriority, ApprovalRequest,
    ApprovalStatus, ChangedField, LockType, Metadata, Role, ScreeningType, Session, SessionLock,
    Step, StepRecord, WorkflowStatus,
};
use crate::permission::is_permitted;
use crate::store::{ActivityLogStore, ApprovalStore, GrantStore, LockStore, SessionStore};
use errors::EngineError;
use std::sync::Arc;
use std::time::Duration as StdDuration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub session_lock_deadline: StdDuration,
    pub default_approval_expiry: chrono::Duration,
    pub default_lock_duration: chrono::Duration,
    pub active_user_staleness: chrono::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_lock_deadline: StdDuration::from_secs(10),
            default_approval_expiry: chrono::Duration::hours(24),
            default_lock_duration: chrono::Duration::hours(24),
            active_user_staleness: chrono::Duration::minutes(30),
        }
    }
}

pub struct WorkflowEngine {
    sessions: Arc<dyn SessionStore>,
    activity_log: Arc<dyn ActivityLogStore>,
    approvals: Arc<dyn ApprovalStore>,
    locks: Arc<dyn LockStore>,
    grants: Arc<dyn GrantStore>,
    clock: Arc<dyn Clock>,
    registry: SessionLockRegistry,
    config: EngineConfig,
    log_seq: std::sync::atomic::AtomicU64,
}

impl WorkflowEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        activity_log: Arc<dyn ActivityLogStore>,
        approvals: Arc<dyn ApprovalStore>,
        locks: Arc<dyn LockStore>,
        grants: Arc<dyn GrantStore>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            sessions,
            activity_log,
            approvals,
            locks,
            grants,
            clock,
            registry: SessionLockRegistry::new(),
            config,
            log_seq: std::sync::atomic::AtomicU64::new(0),
        }
    }

    async fn acquire(
        &self,
        session_id: SessionId,
    ) -> Result<crate::lock_registry::SessionGuard, EngineError> {
        let started = std::time::Instant::now();
        let result = self
            .registry
            .acquire(session_id, self.config.session_lock_deadline)
            .await
            .map_err(|err| match err {
                SessionLockError::Timeout { deadline_ms, .. } => {
                    EngineError::Busy { deadline_ms }
                }
            });
        metrics::histogram!(
            "workflow.engine.lock_wait_ms",
            started.elapsed().as_secs_f64() * 1000.0
        );
        result
    }

    async fn permission_for(
        &self,
        identity: &Identity,
        session_id: SessionId,
        step: Step,
        action: Action,
    ) -> Result<(), EngineError> {
        let grant = self.grants.get(&identity.user_id, session_id).await?;
        let now = self.clock.now();
        if is_permitted(identity.role, step, action, grant.as_ref(), now) {
            Ok(())
        } else {
            Err(EngineError::Forbidden {
                user_id: identity.user_id.clone(),
                step: step.to_string(),
                action: action.to_string(),
                reason: format!("role {} is not permitted", identity.role),
            })
        }
    }

    fn prune_stale_active_users(&self, session: &mut Session, now: chrono::DateTime<chrono::Utc>) {
        let staleness = self.config.active_user_staleness;
        let last_action = session.updated_at;
        if now - last_action > staleness {
            session.active_users.clear();
        }
    }

    async fn append_log(
        &self,
        session: &Session,
        step: Option<Step>,
        action: Action,
        identity: &Identity,
        previous_data: Option<serde_json::Value>,
        new_data: Option<serde_json::Value>,
        changed_fields: Vec<ChangedField>,
        comment: Option<String>,
    ) -> Result<(), EngineError> {
        let entry = ActivityLogEntry {
            log_id: crate::ids::LogId::new(),
            session_id: session.session_id,
            patient_id: session.patient_id.clone(),
            step,
            action,
            user_id: identity.user_id.clone(),
            user_name: identity.display_name.clone(),
            user_role: Some(identity.role),
            timestamp: self.clock.now(),
            seq: self.log_seq.fetch_add(1, std::sync::atomic::Ordering::SeqCst),
            previous_data,
            new_data,
            changed_fields,
            comment,
            source_ip: None,
            device_tag: None,
        };
        self.activity_log.append(entry).await
    }

    #[tracing::instrument(skip(self, metadata))]
    pub async fn create_session(
        &self,
        identity: &Identity,
        patient_id: PatientId,
        patient_display_name: String,
        initial_step: Step,
        metadata: Option<Metadata>,
    ) -> Result<Session, EngineError> {
        self.permission_for(identity, SessionId::new(), initial_step, Action::Create)
            .await?;

        let now = self.clock.now();
        let mut steps: Vec<StepRecord> = Step::PIPELINE.into_iter().map(StepRecord::new_pending).collect();
        if let Some(record) = steps.iter_mut().find(|s| s.step == initial_step) {
            record.status = WorkflowStatus::InProgress;
            record.started_at = Some(now);
            record.assigned_user_id = Some(identity.user_id.clone());
            record.assigned_user_name = Some(identity.display_name.clone());
            record.assigned_role = Some(identity.role);
        }

        let session_id = SessionId::new();
        let session = Session {
            session_id,
            patient_id,
            patient_display_name,
            screening_type: ScreeningType::default(),
            current_step: initial_step,
            overall_status: WorkflowStatus::InProgress,
            created_at: now,
            updated_at: now,
            creator_id: identity.user_id.clone(),
            active_users: [identity.user_id.clone()].into_iter().collect(),
            all_participants: [identity.user_id.clone()].into_iter().collect(),
            requires_final_approval: true,
            final_approver_id: None,
            final_approved_at: None,
            locked: false,
            lock_reason: None,
            quality_check: None,
            total_duration_minutes: None,
            metadata: metadata
                .map(|m| m.into_iter().collect())
                .unwrap_or_default(),
            steps,
        };

        let guard = self.acquire(session_id).await?;
        self.sessions.insert(session.clone()).await?;
        self.append_log(
            &session,
            Some(initial_step),
            Action::Create,
            identity,
            None,
            None,
            Vec::new(),
            None,
        )
        .await?;
        drop(guard);

        metrics::counter!("workflow.engine.create_session", 1);
        Ok(session)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_session(
        &self,
        identity: &Identity,
        session_id: SessionId,
    ) -> Result<Session, EngineError> {
        let guard = self.acquire(session_id).await?;
        let session = self.sessions.get(session_id).await?;
        self.permission_for(identity, session_id, session.current_step, Action::View)
            .await?;
        self.append_log(
            &session, None, Action::View, identity, None, None, Vec::new(), None,
        )
        .await?;
        drop(guard);
        Ok(session)
    }

    #[tracing::instrument(skip(self, data_patch, comments))]
    #[allow(clippy::too_many_arguments)]
    pub async fn update_step(
        &self,
        identity: &Identity,
        session_id: SessionId,
        step: Step,
        data_patch: serde_json::Map<String, serde_json::Value>,
        complete: bool,
        request_approval: bool,
        comments: Option<String>,
    ) -> Result<Session, EngineError> {
        let guard = self.acquire(session_id).await?;
        let mut session = self.sessions.get(session_id).await?;
        let now = self.clock.now();

        let action = if complete { Action::Complete } else { Action::Update };
        self.permission_for(identity, session_id, step, action).await?;

        if session.locked && !(identity.role == Role::Supervisor && !self.is_administrative_lock(session_id).await?) {
            return Err(EngineError::Locked {
                reason: session
                    .lock_reason
                    .clone()
                    .unwrap_or_else(|| "session is locked".to_string()),
            });
        }
        if self.step_is_locked(session_id, step).await? {
            return Err(EngineError::Locked {
                reason: format!("step {step} is locked"),
            });
        }

        let current_position = session.current_step.position();
        let target_position = step.position();
        match (current_position, target_position) {
            (Some(current), Some(target)) if target > current => {
                return Err(EngineError::StepNotReachable {
                    step: step.to_string(),
                    current_step: session.current_step.to_string(),
                });
            }
            _ => {}
        }

        let record = session
            .step_mut(step)
            .ok_or_else(|| EngineError::not_found("step", step.to_string()))?;
        // A rejected step may be reopened, but only by a supervisor and only
        // as a non-completing write — everyone else, and any write to an
        // already-approved step, hits the boundary rule below.
        let reopening_rejected = record.status == WorkflowStatus::Rejected
            && identity.role == Role::Supervisor
            && !complete;
        if matches!(record.status, WorkflowStatus::Approved | WorkflowStatus::Rejected) && !reopening_rejected {
            return Err(EngineError::Conflict {
                reason: format!("step {step} is already {}", record.status),
            });
        }
        if reopening_rejected {
            record.status = WorkflowStatus::InProgress;
        }

        let previous_data = serde_json::to_value(&record.data).unwrap_or(serde_json::Value::Null);
        let changed_fields = record.data.apply_patch(&data_patch, now);
        let new_data = serde_json::to_value(&record.data).unwrap_or(serde_json::Value::Null);

        if record.started_at.is_none() {
            record.started_at = Some(now);
        }
        record.assigned_user_id = Some(identity.user_id.clone());
        record.assigned_user_name = Some(identity.display_name.clone());
        record.assigned_role = Some(identity.role);
        if record.status == WorkflowStatus::Pending {
            record.status = WorkflowStatus::InProgress;
        }

        let mut auto_approval: Option<ApprovalRequest> = None;
        if complete {
            record.completed_at = Some(now);
            if let Some(started) = record.started_at {
                record.actual_duration_minutes = Some((now - started).num_minutes());
            }
            record.completer_id = Some(identity.user_id.clone());
            record.completer_name = Some(identity.display_name.clone());

            if request_approval || record.requires_approval {
                record.status = WorkflowStatus::RequiresApproval;
            } else {
                record.status = WorkflowStatus::Completed;
            }
        }

        let advances = complete && record.status == WorkflowStatus::Completed;
        if advances {
            if let Some(next_step) = step.next() {
                session.current_step = next_step;
            } else {
                session.current_step = Step::Completed;
            }
        }

        if complete && record.status == WorkflowStatus::RequiresApproval {
            let existing = self.approvals.list_pending_for_session(session_id).await?;
            if !existing.iter().any(|r| r.step == step) {
                auto_approval = Some(ApprovalRequest {
                    request_id: ApprovalRequestId::new(),
                    session_id,
                    step,
                    requester_id: identity.user_id.clone(),
                    requester_name: identity.display_name.clone(),
                    requested_at: now,
                    approval_type: "step_completion".to_string(),
                    reason: comments.clone().unwrap_or_else(|| "step completed".to_string()),
                    data_snapshot: new_data.clone(),
                    status: ApprovalStatus::Pending,
                    approver_id: None,
                    approver_name: None,
                    approved_at: None,
                    rejection_reason: None,
                    priority: ApprovalPriority::Normal,
                    expires_at: now + self.config.default_approval_expiry,
                });
            }
        }

        session.all_participants.insert(identity.user_id.clone());
        session.active_users.insert(identity.user_id.clone());
        self.prune_stale_active_users(&mut session, now);
        session.updated_at = now;
        session.overall_status = derive_overall_status(&session.steps, session.locked);

        self.sessions.update(session.clone()).await?;
        self.append_log(
            &session,
            Some(step),
            action,
            identity,
            Some(previous_data),
            Some(new_data),
            changed_fields,
            comments,
        )
        .await?;

        if let Some(request) = auto_approval {
            self.approvals.insert(request.clone()).await?;
            self.append_log(
                &session,
                Some(step),
                Action::Create,
                identity,
                None,
                Some(request.data_snapshot.clone()),
                Vec::new(),
                Some("approval request auto-opened".to_string()),
            )
            .await?;
        }

        drop(guard);
        metrics::counter!("workflow.engine.update_step", 1);
        Ok(session)
    }

    /// Reads the session's active locks, lazily transitioning any that have
    /// passed `expires_at` to `active = false` as part of this read — the
    /// store never sweeps expiry in the background.
    async fn effective_locks(&self, session_id: SessionId) -> Result<Vec<SessionLock>, EngineError> {
        let now = self.clock.now();
        let stored = self.locks.list_active_for_session(session_id).await?;
        let mut effective = Vec::with_capacity(stored.len());
        for mut lock in stored {
            if lock.expires_at <= now {
                lock.active = false;
                self.locks.update(lock).await?;
                metrics::counter!("workflow.engine.lock_expired", 1);
            } else {
                effective.push(lock);
            }
        }
        Ok(effective)
    }

    async fn is_administrative_lock(&self, session_id: SessionId) -> Result<bool, EngineError> {
        let locks = self.effective_locks(session_id).await?;
        Ok(locks
            .iter()
            .any(|l| l.step.is_none() && l.lock_type == LockType::Administrative))
    }

    async fn step_is_locked(&self, session_id: SessionId, step: Step) -> Result<bool, EngineError> {
        let locks = self.effective_locks(session_id).await?;
        Ok(locks.iter().any(|l| l.step == Some(step)))
    }

    #[tracing::instrument(skip(self, reason))]
    pub async fn request_approval(
        &self,
        identity: &Identity,
        session_id: SessionId,
        step: Step,
        reason: String,
        data_snapshot: serde_json::Value,
        priority: Option<ApprovalPriority>,
    ) -> Result<ApprovalRequest, EngineError> {
        let guard = self.acquire(session_id).await?;
        let session = self.sessions.get(session_id).await?;

        let record = session
            .step(step)
            .ok_or_else(|| EngineError::not_found("step", step.to_string()))?;
        if !matches!(record.status, WorkflowStatus::RequiresApproval | WorkflowStatus::Completed) {
            return Err(EngineError::Conflict {
                reason: format!("step {step} is not awaiting approval"),
            });
        }

        let existing = self.approvals.list_pending_for_session(session_id).await?;
        if existing.iter().any(|r| r.step == step) {
            return Err(EngineError::Conflict {
                reason: format!("a pending approval request already exists for step {step}"),
            });
        }

        let now = self.clock.now();
        let request = ApprovalRequest {
            request_id: ApprovalRequestId::new(),
            session_id,
            step,
            requester_id: identity.user_id.clone(),
            requester_name: identity.display_name.clone(),
            requested_at: now,
            approval_type: "manual".to_string(),
            reason,
            data_snapshot,
            status: ApprovalStatus::Pending,
            approver_id: None,
            approver_name: None,
            approved_at: None,
            rejection_reason: None,
            priority: priority.unwrap_or_default(),
            expires_at: now + self.config.default_approval_expiry,
        };

        self.approvals.insert(request.clone()).await?;
        self.append_log(
            &session,
            Some(step),
            Action::Create,
            identity,
            None,
            Some(request.data_snapshot.clone()),
            Vec::new(),
            Some(request.reason.clone()),
        )
        .await?;
        drop(guard);
        Ok(request)
    }

    #[tracing::instrument(skip(self, reason))]
    pub async fn resolve_approval(
        &self,
        identity: &Identity,
        request_id: ApprovalRequestId,
        approve: bool,
        reason: Option<String>,
    ) -> Result<ApprovalRequest, EngineError> {
        let mut request = self.approvals.get(request_id).await?;
        let guard = self.acquire(request.session_id).await?;
        let now = self.clock.now();

        self.permission_for(identity, request.session_id, request.step, Action::Approve)
            .await?;

        if request.is_expired(now) {
            request.status = ApprovalStatus::Expired;
            self.approvals.update(request.clone()).await?;
            metrics::counter!("workflow.engine.approval_expired", 1);
            return Err(EngineError::Expired {
                resource: "approval_request".to_string(),
                id: request_id.to_string(),
            });
        }
        if request.status != ApprovalStatus::Pending {
            return Err(EngineError::Conflict {
                reason: format!("approval request is already {}", request.status),
            });
        }

        let mut session = self.sessions.get(request.session_id).await?;
        let step = request.step;

        request.approver_id = Some(identity.user_id.clone());
        request.approver_name = Some(identity.display_name.clone());
        request.approved_at = Some(now);

        if approve {
            request.status = ApprovalStatus::Approved;
            if let Some(record) = session.step_mut(step) {
                record.status = WorkflowStatus::Approved;
                record.approver_id = Some(identity.user_id.clone());
                record.approver_name = Some(identity.display_name.clone());
                record.approved_at = Some(now);
            }
            if let Some(next_step) = step.next() {
                if session.current_step == step {
                    session.current_step = next_step;
                }
            } else if step == Step::FinalApproval {
                session.current_step = Step::Completed;
                session.final_approver_id = Some(identity.user_id.clone());
                session.final_approved_at = Some(now);
                session.total_duration_minutes = Some(
                    session
                        .steps
                        .iter()
                        .map(|s| s.actual_duration_minutes.unwrap_or(0))
                        .sum(),
                );
            }
        } else {
            request.status = ApprovalStatus::Rejected;
            request.rejection_reason = reason.clone();
            if let Some(record) = session.step_mut(step) {
                record.status = WorkflowStatus::Rejected;
            }
        }

        session.updated_at = now;
        session.overall_status = derive_overall_status(&session.steps, session.locked);

        self.approvals.update(request.clone()).await?;
        self.sessions.update(session.clone()).await?;
        self.append_log(
            &session,
            Some(step),
            if approve { Action::Approve } else { Action::Reject },
            identity,
            None,
            None,
            Vec::new(),
            reason,
        )
        .await?;
        drop(guard);
        Ok(request)
    }

    #[tracing::instrument(skip(self, reason))]
    pub async fn lock_session(
        &self,
        identity: &Identity,
        session_id: SessionId,
        step: Option<Step>,
        lock_type: LockType,
        reason: String,
        duration_hours: Option<i64>,
    ) -> Result<SessionLock, EngineError> {
        let guard = self.acquire(session_id).await?;
        let mut session = self.sessions.get(session_id).await?;

        let target_step = step.unwrap_or(session.current_step);
        self.permission_for(identity, session_id, target_step, Action::Lock)
            .await?;

        let now = self.clock.now();
        if step.is_none() {
            let existing = self.effective_locks(session_id).await?;
            if existing.iter().any(|l| l.step.is_none()) {
                return Err(EngineError::Conflict {
                    reason: "session already has an active session-level lock".to_string(),
                });
            }
        }

        let duration = duration_hours
            .map(chrono::Duration::hours)
            .unwrap_or(self.config.default_lock_duration);
        let lock = SessionLock {
            lock_id: LockId::new(),
            session_id,
            step,
            holder_id: identity.user_id.clone(),
            holder_name: identity.display_name.clone(),
            locked_at: now,
            lock_type,
            reason: reason.clone(),
            expires_at: now + duration,
            active: true,
        };

        self.locks.insert(lock.clone()).await?;
        if step.is_none() {
            session.locked = true;
            session.lock_reason = Some(reason.clone());
            session.updated_at = now;
            session.overall_status = derive_overall_status(&session.steps, session.locked);
            self.sessions.update(session.clone()).await?;
        } else if let Some(record) = session.step_mut(target_step) {
            record.locked = true;
            record.lock_reason = Some(reason.clone());
            self.sessions.update(session.clone()).await?;
        }

        self.append_log(
            &session,
            step,
            Action::Lock,
            identity,
            None,
            None,
            Vec::new(),
            Some(reason),
        )
        .await?;
        drop(guard);
        Ok(lock)
    }

    #[tracing::instrument(skip(self, reason))]
    pub async fn unlock_session(
        &self,
        identity: &Identity,
        session_id: SessionId,
        reason: String,
    ) -> Result<WorkflowStatus, EngineError> {
        let guard = self.acquire(session_id).await?;
        let mut session = self.sessions.get(session_id).await?;
        self.permission_for(identity, session_id, session.current_step, Action::Unlock)
            .await?;

        let now = self.clock.now();
        let active_locks = self.locks.list_active_for_session(session_id).await?;
        for mut lock in active_locks {
            lock.active = false;
            self.locks.update(lock).await?;
        }

        session.locked = false;
        session.lock_reason = None;
        for record in session.steps.iter_mut() {
            record.locked = false;
            record.lock_reason = None;
        }
        session.updated_at = now;
        session.overall_status = derive_overall_status(&session.steps, session.locked);
        self.sessions.update(session.clone()).await?;

        self.append_log(
            &session,
            None,
            Action::Unlock,
            identity,
            None,
            None,
            Vec::new(),
            Some(reason),
        )
        .await?;
        drop(guard);
        Ok(session.overall_status)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_activity(
        &self,
        identity: &Identity,
        session_id: SessionId,
        step: Option<Step>,
        action: Option<Action>,
        user_id: Option<UserId>,
        skip_n: usize,
        limit: usize,
    ) -> Result<Vec<ActivityLogEntry>, EngineError> {
        let session = self.sessions.get(session_id).await?;
        self.permission_for(identity, session_id, session.current_step, Action::View)
            .await?;

        let mut entries = self.activity_log.list(session_id, step).await?;
        if let Some(action) = action {
            entries.retain(|e| e.action == action);
        }
        if let Some(ref user_id) = user_id {
            entries.retain(|e| &e.user_id == user_id);
        }
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.seq.cmp(&a.seq)));
        Ok(entries.into_iter().skip(skip_n).take(limit.clamp(1, 100)).collect())
    }

    /// The session's currently-pending approval requests. `update_step` and
    /// `request_approval` don't hand the caller a request id directly when
    /// they auto-open one, so this is how a caller (API handler or test)
    /// finds the id to pass to `resolve_approval`.
    #[tracing::instrument(skip(self))]
    pub async fn list_pending_approvals(
        &self,
        identity: &Identity,
        session_id: SessionId,
    ) -> Result<Vec<ApprovalRequest>, EngineError> {
        let session = self.sessions.get(session_id).await?;
        self.permission_for(identity, session_id, session.current_step, Action::View)
            .await?;
        self.approvals.list_pending_for_session(session_id).await
    }
}
