//! End-to-end scenarios against the in-memory backend, using the literal
//! session/user/patient ids from the engine's design scenarios.

use chrono::TimeZone;
use std::sync::Arc;
use workflow::clock::FixedClock;
use workflow::engine::{EngineConfig, WorkflowEngine};
use workflow::identity::Identity;
use workflow::model::{Action, LockType, Role, Step, WorkflowStatus};
use workflow::store::InMemoryBackend;

fn identity(user_id: &str, display_name: &str, role: Role) -> Identity {
    Identity {
        user_id: user_id.to_string(),
        display_name: display_name.to_string(),
        role,
    }
}

fn base_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap()
}

fn build_engine() -> (WorkflowEngine, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(base_now()));
    let backend = InMemoryBackend::new();
    let engine = WorkflowEngine::new(
        backend.sessions.clone(),
        backend.activity_log.clone(),
        backend.approvals.clone(),
        backend.locks.clone(),
        backend.grants.clone(),
        clock.clone(),
        EngineConfig::default(),
    );
    (engine, clock)
}

fn u1_supervisor() -> Identity {
    identity("U1", "Supervisor One", Role::Supervisor)
}
fn u2_registration() -> Identity {
    identity("U2", "Registration Two", Role::RegistrationStaff)
}
fn u3_vision_tech() -> Identity {
    identity("U3", "Vision Three", Role::VisionTechnician)
}
fn u4_doctor() -> Identity {
    identity("U4", "Doctor Four", Role::Doctor)
}
fn u5_refraction_tech() -> Identity {
    identity("U5", "Refraction Five", Role::RefractionTechnician)
}
fn u6_clinical_assistant() -> Identity {
    identity("U6", "Clinical Six", Role::ClinicalAssistant)
}
fn u7_quality_checker() -> Identity {
    identity("U7", "Quality Seven", Role::QualityChecker)
}

fn empty_patch() -> serde_json::Map<String, serde_json::Value> {
    serde_json::Map::new()
}

fn patch(pairs: &[(&str, &str)]) -> serde_json::Map<String, serde_json::Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect()
}

/// Looks up the session's single pending approval request for `step` and
/// resolves it as `U1`. `update_step`'s auto-opened request id isn't
/// returned directly, so tests locate it through `list_pending_approvals`.
async fn resolve_pending(
    engine: &WorkflowEngine,
    session_id: workflow::ids::SessionId,
    step: Step,
    approve: bool,
    reason: Option<String>,
) -> workflow::model::ApprovalRequest {
    let request_id = pending_request_id(engine, session_id, step).await;
    engine
        .resolve_approval(&u1_supervisor(), request_id, approve, reason)
        .await
        .unwrap()
}

async fn pending_request_id(
    engine: &WorkflowEngine,
    session_id: workflow::ids::SessionId,
    step: Step,
) -> workflow::ids::ApprovalRequestId {
    let pending = engine
        .list_pending_approvals(&u1_supervisor(), session_id)
        .await
        .unwrap();
    pending.into_iter().find(|r| r.step == step).unwrap().request_id
}

/// Drives a fresh session from `registration` through a submitted (but not
/// yet resolved) `doctor_diagnosis`, leaving `current_step =
/// doctor_diagnosis` and exactly one pending approval request — the shared
/// starting point for scenarios B, C and D.
async fn session_pending_doctor_diagnosis_approval(engine: &WorkflowEngine) -> workflow::ids::SessionId {
    let session = engine
        .create_session(&u1_supervisor(), "P100".to_string(), "Jane Doe".to_string(), Step::Registration, None)
        .await
        .unwrap();
    let session_id = session.session_id;

    engine
        .update_step(&u2_registration(), session_id, Step::Registration, patch(&[("full_name", "A")]), true, false, None)
        .await
        .unwrap();
    engine
        .update_step(&u3_vision_tech(), session_id, Step::InitialAssessment, patch(&[("acuity", "20/30")]), true, false, None)
        .await
        .unwrap();
    engine
        .update_step(&u3_vision_tech(), session_id, Step::VisionTesting, empty_patch(), true, false, None)
        .await
        .unwrap();
    engine
        .update_step(&u5_refraction_tech(), session_id, Step::AutoRefraction, empty_patch(), true, false, None)
        .await
        .unwrap();
    engine
        .update_step(&u6_clinical_assistant(), session_id, Step::ClinicalEvaluation, empty_patch(), true, false, None)
        .await
        .unwrap();

    let session = engine
        .update_step(&u4_doctor(), session_id, Step::DoctorDiagnosis, patch(&[("diagnosis", "myopia")]), true, false, None)
        .await
        .unwrap();
    assert_eq!(session.step(Step::DoctorDiagnosis).unwrap().status, WorkflowStatus::RequiresApproval);
    assert_eq!(session.current_step, Step::DoctorDiagnosis);

    session_id
}

#[tokio::test]
async fn scenario_a_happy_path() {
    let (engine, _clock) = build_engine();
    let session = engine
        .create_session(&u1_supervisor(), "P100".to_string(), "Jane Doe".to_string(), Step::Registration, None)
        .await
        .unwrap();
    assert_eq!(session.current_step, Step::Registration);
    assert_eq!(session.overall_status, WorkflowStatus::InProgress);
    let session_id = session.session_id;

    let session = engine
        .update_step(&u2_registration(), session_id, Step::Registration, patch(&[("full_name", "A")]), true, false, None)
        .await
        .unwrap();
    assert_eq!(session.current_step, Step::InitialAssessment);
    assert_eq!(session.step(Step::Registration).unwrap().status, WorkflowStatus::Completed);

    let rejected = engine
        .update_step(&u3_vision_tech(), session_id, Step::VisionTesting, empty_patch(), false, false, None)
        .await;
    assert!(matches!(rejected, Err(errors::EngineError::StepNotReachable { .. })));

    let session = engine
        .update_step(&u3_vision_tech(), session_id, Step::InitialAssessment, patch(&[("acuity", "20/30")]), true, false, None)
        .await
        .unwrap();
    assert_eq!(session.current_step, Step::VisionTesting);

    engine
        .update_step(&u3_vision_tech(), session_id, Step::VisionTesting, empty_patch(), true, false, None)
        .await
        .unwrap();
    engine
        .update_step(&u5_refraction_tech(), session_id, Step::AutoRefraction, empty_patch(), true, false, None)
        .await
        .unwrap();
    engine
        .update_step(&u6_clinical_assistant(), session_id, Step::ClinicalEvaluation, empty_patch(), true, false, None)
        .await
        .unwrap();

    let session = engine
        .update_step(&u4_doctor(), session_id, Step::DoctorDiagnosis, patch(&[("diagnosis", "myopia")]), true, false, None)
        .await
        .unwrap();
    assert_eq!(session.step(Step::DoctorDiagnosis).unwrap().status, WorkflowStatus::RequiresApproval);
    assert_eq!(session.current_step, Step::DoctorDiagnosis);

    resolve_pending(&engine, session_id, Step::DoctorDiagnosis, true, None).await;

    let session = engine.get_session(&u1_supervisor(), session_id).await.unwrap();
    assert_eq!(session.step(Step::DoctorDiagnosis).unwrap().status, WorkflowStatus::Approved);
    assert_eq!(session.current_step, Step::Prescription);

    let session = engine
        .update_step(&u4_doctor(), session_id, Step::Prescription, patch(&[("notes", "lenses")]), true, false, None)
        .await
        .unwrap();
    assert_eq!(session.step(Step::Prescription).unwrap().status, WorkflowStatus::RequiresApproval);
    resolve_pending(&engine, session_id, Step::Prescription, true, None).await;

    engine
        .update_step(&u7_quality_checker(), session_id, Step::QualityCheck, empty_patch(), true, false, None)
        .await
        .unwrap();

    let session = engine
        .update_step(&u4_doctor(), session_id, Step::FinalApproval, patch(&[("summary", "done")]), true, false, None)
        .await
        .unwrap();
    assert_eq!(session.step(Step::FinalApproval).unwrap().status, WorkflowStatus::RequiresApproval);
    resolve_pending(&engine, session_id, Step::FinalApproval, true, None).await;

    let session = engine.get_session(&u1_supervisor(), session_id).await.unwrap();
    assert_eq!(session.overall_status, WorkflowStatus::Approved);
    assert_eq!(session.final_approver_id.as_deref(), Some("U1"));
    assert!(session.total_duration_minutes.is_some());
}

#[tokio::test]
async fn scenario_b_lock_blocks_writes_until_unlocked() {
    let (engine, _clock) = build_engine();
    let session_id = session_pending_doctor_diagnosis_approval(&engine).await;
    resolve_pending(&engine, session_id, Step::DoctorDiagnosis, true, None).await;

    engine
        .lock_session(&u1_supervisor(), session_id, None, LockType::Editing, "pause".to_string(), Some(1))
        .await
        .unwrap();

    let blocked = engine
        .update_step(&u4_doctor(), session_id, Step::Prescription, patch(&[("notes", "x")]), false, false, None)
        .await;
    assert!(matches!(blocked, Err(errors::EngineError::Locked { .. })));

    engine.unlock_session(&u1_supervisor(), session_id, "resume".to_string()).await.unwrap();

    engine
        .update_step(&u4_doctor(), session_id, Step::Prescription, patch(&[("notes", "x")]), false, false, None)
        .await
        .unwrap();

    let logs = engine.list_activity(&u1_supervisor(), session_id, None, None, None, 0, 100).await.unwrap();
    let lock_pos = logs.iter().position(|e| e.action == Action::Lock).unwrap();
    let unlock_pos = logs.iter().position(|e| e.action == Action::Unlock).unwrap();
    // list_activity sorts newest-first, so lock (earlier) sorts after unlock (later).
    assert!(lock_pos > unlock_pos);
}

#[tokio::test]
async fn scenario_c_rejection_then_supervisor_reopens() {
    let (engine, _clock) = build_engine();
    let session_id = session_pending_doctor_diagnosis_approval(&engine).await;

    resolve_pending(&engine, session_id, Step::DoctorDiagnosis, false, Some("incomplete findings".to_string())).await;

    let session = engine.get_session(&u1_supervisor(), session_id).await.unwrap();
    assert_eq!(session.step(Step::DoctorDiagnosis).unwrap().status, WorkflowStatus::Rejected);
    assert_eq!(session.overall_status, WorkflowStatus::Rejected);

    let session = engine
        .update_step(&u1_supervisor(), session_id, Step::DoctorDiagnosis, patch(&[("diagnosis", "revised")]), false, false, None)
        .await
        .unwrap();
    assert_eq!(session.step(Step::DoctorDiagnosis).unwrap().status, WorkflowStatus::InProgress);
    assert_eq!(session.overall_status, WorkflowStatus::InProgress);
}

#[tokio::test]
async fn scenario_d_expired_approval_cannot_be_resolved() {
    let (engine, clock) = build_engine();
    let session_id = session_pending_doctor_diagnosis_approval(&engine).await;
    let request_id = pending_request_id(&engine, session_id, Step::DoctorDiagnosis).await;

    clock.advance(chrono::Duration::hours(25));

    let result = engine.resolve_approval(&u1_supervisor(), request_id, true, None).await;
    assert!(matches!(result, Err(errors::EngineError::Expired { .. })));

    let session = engine.get_session(&u1_supervisor(), session_id).await.unwrap();
    assert_eq!(session.step(Step::DoctorDiagnosis).unwrap().status, WorkflowStatus::RequiresApproval);
}

#[tokio::test]
async fn scenario_f_permission_denial_leaves_no_state_change() {
    let (engine, _clock) = build_engine();
    let session = engine
        .create_session(&u1_supervisor(), "P100".to_string(), "Jane Doe".to_string(), Step::Registration, None)
        .await
        .unwrap();
    let session_id = session.session_id;

    let result = engine
        .update_step(&u2_registration(), session_id, Step::DoctorDiagnosis, empty_patch(), false, false, None)
        .await;
    assert!(matches!(result, Err(errors::EngineError::Forbidden { .. })));

    let session = engine.get_session(&u1_supervisor(), session_id).await.unwrap();
    assert_eq!(session.current_step, Step::Registration);
}

#[tokio::test]
async fn update_step_with_empty_patch_is_a_state_no_op_but_still_logs() {
    let (engine, _clock) = build_engine();
    let session = engine
        .create_session(&u1_supervisor(), "P100".to_string(), "Jane Doe".to_string(), Step::Registration, None)
        .await
        .unwrap();
    let session_id = session.session_id;

    let before = engine
        .update_step(&u2_registration(), session_id, Step::Registration, empty_patch(), false, false, None)
        .await
        .unwrap();
    assert_eq!(before.step(Step::Registration).unwrap().status, WorkflowStatus::InProgress);

    let logs = engine.list_activity(&u1_supervisor(), session_id, None, None, None, 0, 100).await.unwrap();
    let update_entry = logs.iter().find(|e| e.action == Action::Update).unwrap();
    assert!(update_entry.changed_fields.is_empty());
}

#[tokio::test]
async fn double_approving_the_same_request_conflicts() {
    let (engine, _clock) = build_engine();
    let session_id = session_pending_doctor_diagnosis_approval(&engine).await;
    let request_id = pending_request_id(&engine, session_id, Step::DoctorDiagnosis).await;

    engine.resolve_approval(&u1_supervisor(), request_id, true, None).await.unwrap();
    let second = engine.resolve_approval(&u1_supervisor(), request_id, true, None).await;
    assert!(matches!(second, Err(errors::EngineError::Conflict { .. })));
}
