//! The data model: Session, Step record, Activity log entry, Approval
//! request, Session lock, User access grant, and the enumerations shared
//! across them.

use crate::ids::{ApprovalRequestId, LockId, LogId, PatientId, SessionId, UserId};
use crate::step_data::StepData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use strum::{Display, EnumIter, EnumString};

/// The fixed pipeline order, plus the terminal sentinel `completed`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Step {
    Registration,
    InitialAssessment,
    VisionTesting,
    AutoRefraction,
    ClinicalEvaluation,
    DoctorDiagnosis,
    Prescription,
    QualityCheck,
    FinalApproval,
    /// Terminal sentinel. Permits no actions.
    Completed,
}

impl Step {
    /// The ordered pipeline, excluding the terminal sentinel.
    pub const PIPELINE: [Step; 9] = [
        Step::Registration,
        Step::InitialAssessment,
        Step::VisionTesting,
        Step::AutoRefraction,
        Step::ClinicalEvaluation,
        Step::DoctorDiagnosis,
        Step::Prescription,
        Step::QualityCheck,
        Step::FinalApproval,
    ];

    pub fn position(self) -> Option<usize> {
        Self::PIPELINE.iter().position(|s| *s == self)
    }

    /// The step that follows this one in the pipeline, or `None` once
    /// `final_approval` completes (the session has no next step; it
    /// transitions to the `completed` sentinel instead).
    pub fn next(self) -> Option<Step> {
        let pos = self.position()?;
        Self::PIPELINE.get(pos + 1).copied()
    }

    /// True for `doctor_diagnosis`, `prescription`, `final_approval`.
    pub fn requires_approval(self) -> bool {
        matches!(self, Step::DoctorDiagnosis | Step::Prescription | Step::FinalApproval)
    }
}

/// Workflow status, applied to Step records directly and derived for
/// Sessions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Approved,
    RequiresApproval,
    Rejected,
    Locked,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    RegistrationStaff,
    VisionTechnician,
    RefractionTechnician,
    ClinicalAssistant,
    Doctor,
    Supervisor,
    QualityChecker,
}

/// Logged verbs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    Complete,
    Approve,
    Reject,
    Lock,
    Unlock,
    View,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LockType {
    Editing,
    Approval,
    Administrative,
}

/// The screening type on a Session. Kept as a newtype over `String` rather
/// than a closed enum: only one concrete value is in active use
/// (`hospital_mobile_unit`) and new screening programs may add values
/// without a code change — a closed enum would invent variants that don't
/// exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningType(pub String);

impl Default for ScreeningType {
    fn default() -> Self {
        ScreeningType("hospital_mobile_unit".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityCheck {
    pub checker_id: Option<UserId>,
    pub timestamp: Option<DateTime<Utc>>,
    /// 0..=100
    pub score: Option<u8>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub patient_id: PatientId,
    pub patient_display_name: String,
    pub screening_type: ScreeningType,
    pub current_step: Step,
    pub overall_status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub creator_id: UserId,
    pub active_users: BTreeSet<UserId>,
    pub all_participants: BTreeSet<UserId>,
    pub requires_final_approval: bool,
    pub final_approver_id: Option<UserId>,
    pub final_approved_at: Option<DateTime<Utc>>,
    pub locked: bool,
    pub lock_reason: Option<String>,
    pub quality_check: Option<QualityCheck>,
    pub total_duration_minutes: Option<i64>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub steps: Vec<StepRecord>,
}

impl Session {
    pub fn step(&self, step: Step) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.step == step)
    }

    pub fn step_mut(&mut self, step: Step) -> Option<&mut StepRecord> {
        self.steps.iter_mut().find(|s| s.step == step)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: Step,
    pub status: WorkflowStatus,
    pub assigned_user_id: Option<UserId>,
    pub assigned_user_name: Option<String>,
    pub assigned_role: Option<Role>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completer_id: Option<UserId>,
    pub completer_name: Option<String>,
    pub approver_id: Option<UserId>,
    pub approver_name: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub data: StepData,
    pub validation_errors: Vec<String>,
    pub requires_approval: bool,
    pub locked: bool,
    pub lock_reason: Option<String>,
    pub estimated_duration_minutes: Option<i64>,
    pub actual_duration_minutes: Option<i64>,
}

impl StepRecord {
    pub fn new_pending(step: Step) -> Self {
        Self {
            step,
            status: WorkflowStatus::Pending,
            assigned_user_id: None,
            assigned_user_name: None,
            assigned_role: None,
            started_at: None,
            completed_at: None,
            completer_id: None,
            completer_name: None,
            approver_id: None,
            approver_name: None,
            approved_at: None,
            data: StepData::new(step),
            validation_errors: Vec::new(),
            requires_approval: step.requires_approval(),
            locked: false,
            lock_reason: None,
            estimated_duration_minutes: None,
            actual_duration_minutes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedField {
    pub field: String,
    pub old: Option<serde_json::Value>,
    pub new: Option<serde_json::Value>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub log_id: LogId,
    pub session_id: SessionId,
    pub patient_id: PatientId,
    /// `None` for session-level actions not scoped to a single step
    /// (e.g. a session-wide `lock`/`unlock`).
    pub step: Option<Step>,
    pub action: Action,
    pub user_id: UserId,
    pub user_name: String,
    pub user_role: Option<Role>,
    pub timestamp: DateTime<Utc>,
    /// Monotonically increasing append order, assigned by the engine.
    /// Breaks ties between entries sharing a `timestamp` — `log_id` is a
    /// random UUID and carries no ordering information.
    pub seq: u64,
    pub previous_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub changed_fields: Vec<ChangedField>,
    pub comment: Option<String>,
    pub source_ip: Option<String>,
    pub device_tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub request_id: ApprovalRequestId,
    pub session_id: SessionId,
    pub step: Step,
    pub requester_id: UserId,
    pub requester_name: String,
    pub requested_at: DateTime<Utc>,
    pub approval_type: String,
    pub reason: String,
    pub data_snapshot: serde_json::Value,
    pub status: ApprovalStatus,
    pub approver_id: Option<UserId>,
    pub approver_name: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub priority: ApprovalPriority,
    pub expires_at: DateTime<Utc>,
}

impl ApprovalRequest {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ApprovalStatus::Pending && self.expires_at <= now
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLock {
    pub lock_id: LockId,
    pub session_id: SessionId,
    /// `None` means whole-session scope.
    pub step: Option<Step>,
    pub holder_id: UserId,
    pub holder_name: String,
    pub locked_at: DateTime<Utc>,
    pub lock_type: LockType,
    pub reason: String,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
}

impl SessionLock {
    /// A lock counts as blocking only while `active` and not yet expired.
    /// Expiry is lazy: readers must check it before treating a lock as
    /// blocking rather than relying on a background sweep to flip `active`.
    pub fn is_effectively_active(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at > now
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccessGrant {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub role: Role,
    pub allowed_steps: BTreeSet<Step>,
    pub permissions: BTreeSet<Action>,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
}

impl UserAccessGrant {
    pub fn is_effectively_active(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.is_none_or(|exp| exp > now)
    }
}

/// Derives `overall_status` from step statuses and the session lock flag.
/// Precedence, highest first: approved, rejected, locked, requires_approval,
/// in_progress, pending.
pub fn derive_overall_status(steps: &[StepRecord], session_locked: bool) -> WorkflowStatus {
    let final_approval_approved = steps
        .iter()
        .find(|s| s.step == Step::FinalApproval)
        .is_some_and(|s| s.status == WorkflowStatus::Approved);

    let all_completed_or_approved = steps
        .iter()
        .all(|s| matches!(s.status, WorkflowStatus::Completed | WorkflowStatus::Approved));

    if all_completed_or_approved && final_approval_approved {
        return WorkflowStatus::Approved;
    }
    if steps.iter().any(|s| s.status == WorkflowStatus::Rejected) {
        return WorkflowStatus::Rejected;
    }
    if session_locked {
        return WorkflowStatus::Locked;
    }
    if steps.iter().any(|s| s.status == WorkflowStatus::RequiresApproval) {
        return WorkflowStatus::RequiresApproval;
    }
    if steps.iter().any(|s| s.status == WorkflowStatus::InProgress) {
        return WorkflowStatus::InProgress;
    }
    WorkflowStatus::Pending
}

pub type Metadata = HashMap<String, serde_json::Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_order_is_registration_first_final_approval_last() {
        assert_eq!(Step::Registration.next(), Some(Step::InitialAssessment));
        assert_eq!(Step::FinalApproval.next(), None);
        assert_eq!(Step::Registration.position(), Some(0));
    }

    #[test]
    fn only_three_steps_require_approval() {
        let needs: Vec<Step> = Step::PIPELINE
            .into_iter()
            .filter(|s| s.requires_approval())
            .collect();
        assert_eq!(
            needs,
            vec![Step::DoctorDiagnosis, Step::Prescription, Step::FinalApproval]
        );
    }

    #[test]
    fn derive_overall_status_precedence() {
        let mut steps: Vec<StepRecord> = Step::PIPELINE
            .into_iter()
            .map(StepRecord::new_pending)
            .collect();
        assert_eq!(derive_overall_status(&steps, false), WorkflowStatus::Pending);

        steps[0].status = WorkflowStatus::InProgress;
        assert_eq!(derive_overall_status(&steps, false), WorkflowStatus::InProgress);

        steps[1].status = WorkflowStatus::RequiresApproval;
        assert_eq!(derive_overall_status(&steps, false), WorkflowStatus::RequiresApproval);

        // a session-level lock overrides in_progress/requires_approval...
        assert_eq!(derive_overall_status(&steps, true), WorkflowStatus::Locked);

        // ...but rejection overrides the lock.
        steps[2].status = WorkflowStatus::Rejected;
        assert_eq!(derive_overall_status(&steps, true), WorkflowStatus::Rejected);
    }

    #[test]
    fn derive_overall_status_approved_requires_final_approval_approved() {
        let mut steps: Vec<StepRecord> = Step::PIPELINE
            .into_iter()
            .map(StepRecord::new_pending)
            .collect();
        for s in steps.iter_mut() {
            s.status = WorkflowStatus::Completed;
        }
        // all completed, but final_approval not yet `approved`
        assert_ne!(derive_overall_status(&steps, false), WorkflowStatus::Approved);

        steps
            .iter_mut()
            .find(|s| s.step == Step::FinalApproval)
            .unwrap()
            .status = WorkflowStatus::Approved;
        assert_eq!(derive_overall_status(&steps, false), WorkflowStatus::Approved);
    }
}
