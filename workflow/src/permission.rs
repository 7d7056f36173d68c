//! The permission resolver: a static role/step/action matrix with a
//! per-session grant overlay.
//!
//! The matrix is small and fixed (7 roles × 9 steps), so this is a plain
//! synchronous function over enums rather than a policy-engine evaluation —
//! nothing here is dynamic enough to need rule compilation or an entity
//! store.

use crate::model::{Action, Role, Step, UserAccessGrant};
use chrono::{DateTime, Utc};

/// Evaluates whether `role` may perform `action` on `step`, given any
/// currently-active per-session grant for the acting user.
///
/// Evaluation order:
/// 1. The terminal `completed` step permits no actions to anyone.
/// 2. `view` is permitted to any role on any non-terminal step.
/// 3. A supervisor may perform any action on any step.
/// 4. An active grant for this user, if present, is consulted: it may
///    widen access beyond the base matrix (its `allowed_steps` and
///    `permissions` are additive), but never narrows it.
/// 5. Otherwise the base role/step/action matrix decides.
pub fn is_permitted(
    role: Role,
    step: Step,
    action: Action,
    grant: Option<&UserAccessGrant>,
    now: DateTime<Utc>,
) -> bool {
    if step == Step::Completed {
        return false;
    }
    if action == Action::View {
        return true;
    }
    if role == Role::Supervisor {
        return true;
    }
    if let Some(grant) = grant {
        if grant.is_effectively_active(now)
            && grant.allowed_steps.contains(&step)
            && grant.permissions.contains(&action)
        {
            return true;
        }
    }
    base_matrix_permits(role, step, action)
}

fn base_matrix_permits(role: Role, step: Step, action: Action) -> bool {
    use Action::*;
    use Role::*;
    use Step::*;

    // approve/reject are reserved for doctor and supervisor (supervisor is
    // short-circuited above); lock/unlock likewise require doctor or
    // supervisor.
    match action {
        Approve | Reject => return role == Doctor,
        Lock | Unlock => return role == Doctor,
        _ => {}
    }

    match (role, step) {
        (RegistrationStaff, Registration) => matches!(action, Create | Update | Complete | Edit),
        (VisionTechnician, InitialAssessment | VisionTesting) => {
            matches!(action, Update | Complete | Edit)
        }
        (RefractionTechnician, AutoRefraction) => matches!(action, Update | Complete | Edit),
        (ClinicalAssistant, ClinicalEvaluation) => matches!(action, Update | Complete | Edit),
        (Doctor, DoctorDiagnosis | Prescription | FinalApproval) => {
            matches!(action, Update | Complete | Edit)
        }
        (QualityChecker, QualityCheck) => matches!(action, Update | Complete | Edit),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeSet;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn view_is_permitted_to_any_role_on_any_non_terminal_step() {
        assert!(is_permitted(
            Role::QualityChecker,
            Step::Registration,
            Action::View,
            None,
            now()
        ));
    }

    #[test]
    fn completed_step_permits_nothing_even_to_supervisor() {
        assert!(!is_permitted(
            Role::Supervisor,
            Step::Completed,
            Action::View,
            None,
            now()
        ));
    }

    #[test]
    fn supervisor_may_act_on_any_step() {
        assert!(is_permitted(
            Role::Supervisor,
            Step::AutoRefraction,
            Action::Complete,
            None,
            now()
        ));
    }

    #[test]
    fn registration_staff_cannot_touch_vision_testing() {
        assert!(!is_permitted(
            Role::RegistrationStaff,
            Step::VisionTesting,
            Action::Update,
            None,
            now()
        ));
    }

    #[test]
    fn only_doctor_or_supervisor_may_approve() {
        assert!(!is_permitted(
            Role::ClinicalAssistant,
            Step::DoctorDiagnosis,
            Action::Approve,
            None,
            now()
        ));
        assert!(is_permitted(
            Role::Doctor,
            Step::DoctorDiagnosis,
            Action::Approve,
            None,
            now()
        ));
    }

    #[test]
    fn active_grant_widens_access_beyond_base_matrix() {
        let grant = UserAccessGrant {
            user_id: "u1".to_string(),
            session_id: crate::ids::SessionId::new(),
            role: Role::RegistrationStaff,
            allowed_steps: BTreeSet::from([Step::VisionTesting]),
            permissions: BTreeSet::from([Action::Update]),
            granted_at: now(),
            expires_at: None,
            active: true,
        };
        assert!(!is_permitted(
            Role::RegistrationStaff,
            Step::VisionTesting,
            Action::Update,
            None,
            now()
        ));
        assert!(is_permitted(
            Role::RegistrationStaff,
            Step::VisionTesting,
            Action::Update,
            Some(&grant),
            now()
        ));
    }

    #[test]
    fn expired_grant_does_not_widen_access() {
        let grant = UserAccessGrant {
            user_id: "u1".to_string(),
            session_id: crate::ids::SessionId::new(),
            role: Role::RegistrationStaff,
            allowed_steps: BTreeSet::from([Step::VisionTesting]),
            permissions: BTreeSet::from([Action::Update]),
            granted_at: now(),
            expires_at: Some(now() - chrono::Duration::hours(1)),
            active: true,
        };
        assert!(!is_permitted(
            Role::RegistrationStaff,
            Step::VisionTesting,
            Action::Update,
            Some(&grant),
            now()
        ));
    }
}
