//! Two writers racing the same session/step: the per-session lock must
//! serialize them so neither's read-modify-write clobbers the other's.

use chrono::TimeZone;
use std::sync::Arc;
use workflow::clock::FixedClock;
use workflow::engine::{EngineConfig, WorkflowEngine};
use workflow::identity::Identity;
use workflow::model::{Role, Step};
use workflow::store::InMemoryBackend;

fn identity(user_id: &str, display_name: &str, role: Role) -> Identity {
    Identity {
        user_id: user_id.to_string(),
        display_name: display_name.to_string(),
        role,
    }
}

fn patch(pairs: &[(&str, &str)]) -> serde_json::Map<String, serde_json::Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect()
}

#[tokio::test]
async fn two_concurrent_writers_on_the_same_step_do_not_interleave() {
    let clock = Arc::new(FixedClock::new(
        chrono::Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap(),
    ));
    let backend = InMemoryBackend::new();
    let engine = Arc::new(WorkflowEngine::new(
        backend.sessions.clone(),
        backend.activity_log.clone(),
        backend.approvals.clone(),
        backend.locks.clone(),
        backend.grants.clone(),
        clock.clone(),
        EngineConfig::default(),
    ));

    let u1 = identity("U1", "Supervisor One", Role::Supervisor);
    let u2 = identity("U2", "Registration Two", Role::RegistrationStaff);

    let session = engine
        .create_session(&u1, "P100".to_string(), "Jane Doe".to_string(), Step::Registration, None)
        .await
        .unwrap();
    let session_id = session.session_id;

    let engine_a = engine.clone();
    let u1_a = u1.clone();
    let task_a = tokio::spawn(async move {
        engine_a
            .update_step(&u1_a, session_id, Step::Registration, patch(&[("full_name", "Jane Doe")]), false, false, None)
            .await
    });

    let engine_b = engine.clone();
    let u2_b = u2.clone();
    let task_b = tokio::spawn(async move {
        engine_b
            .update_step(&u2_b, session_id, Step::Registration, patch(&[("date_of_birth", "1990-01-01")]), false, false, None)
            .await
    });

    let (result_a, result_b) = tokio::join!(task_a, task_b);
    result_a.unwrap().unwrap();
    result_b.unwrap().unwrap();

    let session = engine.get_session(&u1, session_id).await.unwrap();
    let record = session.step(Step::Registration).unwrap();
    let fields = record.data.fields();
    assert_eq!(fields.get("full_name").and_then(|v| v.as_str()), Some("Jane Doe"));
    assert_eq!(fields.get("date_of_birth").and_then(|v| v.as_str()), Some("1990-01-01"));

    let logs = engine.list_activity(&u1, session_id, Some(Step::Registration), None, None, 0, 100).await.unwrap();
    let update_entries: Vec<_> = logs.iter().filter(|e| e.action == workflow::model::Action::Update).collect();
    assert_eq!(update_entries.len(), 2);
    assert_ne!(update_entries[0].log_id, update_entries[1].log_id);
}
