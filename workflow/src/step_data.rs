//! Step-specific payload representation.
//!
//! Each step's free-form data is modeled as a tagged variant with its own
//! named, typed fields plus an `extra` fallback map for forward-compatible
//! unknown fields — the activity log snapshots the tagged value's
//! serialized form directly.

use crate::model::{ChangedField, Step};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

macro_rules! step_data_struct {
    ($name:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
        pub struct $name {
            $(
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
            #[serde(flatten)]
            pub extra: Map<String, Value>,
        }
    };
}

step_data_struct!(RegistrationData {
    full_name: String,
    date_of_birth: String,
    contact_phone: String,
});

step_data_struct!(InitialAssessmentData {
    acuity: String,
    complaints: String,
});

step_data_struct!(VisionTestingData {
    distance_acuity: String,
    near_acuity: String,
    color_vision_normal: bool,
});

step_data_struct!(AutoRefractionData {
    sphere_right: f64,
    sphere_left: f64,
    cylinder_right: f64,
    cylinder_left: f64,
});

step_data_struct!(ClinicalEvaluationData {
    findings: String,
    referral_needed: bool,
});

step_data_struct!(DoctorDiagnosisData {
    diagnosis: String,
    severity: String,
});

step_data_struct!(PrescriptionData {
    notes: String,
    follow_up_required: bool,
});

step_data_struct!(QualityCheckData {
    checklist_passed: bool,
    notes: String,
});

step_data_struct!(FinalApprovalData { summary: String });

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepData {
    Registration(RegistrationData),
    InitialAssessment(InitialAssessmentData),
    VisionTesting(VisionTestingData),
    AutoRefraction(AutoRefractionData),
    ClinicalEvaluation(ClinicalEvaluationData),
    DoctorDiagnosis(DoctorDiagnosisData),
    Prescription(PrescriptionData),
    QualityCheck(QualityCheckData),
    FinalApproval(FinalApprovalData),
    /// The terminal sentinel carries no data of its own.
    Completed,
}

impl StepData {
    pub fn new(step: Step) -> Self {
        match step {
            Step::Registration => StepData::Registration(Default::default()),
            Step::InitialAssessment => StepData::InitialAssessment(Default::default()),
            Step::VisionTesting => StepData::VisionTesting(Default::default()),
            Step::AutoRefraction => StepData::AutoRefraction(Default::default()),
            Step::ClinicalEvaluation => StepData::ClinicalEvaluation(Default::default()),
            Step::DoctorDiagnosis => StepData::DoctorDiagnosis(Default::default()),
            Step::Prescription => StepData::Prescription(Default::default()),
            Step::QualityCheck => StepData::QualityCheck(Default::default()),
            Step::FinalApproval => StepData::FinalApproval(Default::default()),
            Step::Completed => StepData::Completed,
        }
    }

    fn step(&self) -> Step {
        match self {
            StepData::Registration(_) => Step::Registration,
            StepData::InitialAssessment(_) => Step::InitialAssessment,
            StepData::VisionTesting(_) => Step::VisionTesting,
            StepData::AutoRefraction(_) => Step::AutoRefraction,
            StepData::ClinicalEvaluation(_) => Step::ClinicalEvaluation,
            StepData::DoctorDiagnosis(_) => Step::DoctorDiagnosis,
            StepData::Prescription(_) => Step::Prescription,
            StepData::QualityCheck(_) => Step::QualityCheck,
            StepData::FinalApproval(_) => Step::FinalApproval,
            StepData::Completed => Step::Completed,
        }
    }

    /// The inner record's fields as a flat JSON object, without the `step`
    /// discriminant tag — this is the representation both patches and
    /// activity-log snapshots operate on.
    pub fn fields(&self) -> Map<String, Value> {
        let full = serde_json::to_value(self).expect("step data always serializes");
        match full {
            Value::Object(mut map) => {
                map.remove("step");
                map
            }
            _ => Map::new(),
        }
    }

    fn from_fields(step: Step, mut fields: Map<String, Value>) -> Self {
        fields.insert("step".to_string(), Value::String(step_tag(step).to_string()));
        serde_json::from_value(Value::Object(fields))
            .unwrap_or_else(|_| StepData::new(step))
    }

    /// Merges `patch` into this step's data using last-writer-wins at
    /// field granularity, returning the precise change list. Field
    /// comparison is deep-equal on scalars and shallow-equal on nested
    /// maps/arrays (a changed submap is recorded as one change).
    pub fn apply_patch(
        &mut self,
        patch: &Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Vec<ChangedField> {
        let before = self.fields();
        let mut merged = before.clone();
        for (key, value) in patch {
            merged.insert(key.clone(), value.clone());
        }

        let mut changes = Vec::new();
        for (key, new_value) in patch {
            let old_value = before.get(key).cloned();
            if old_value.as_ref() != Some(new_value) {
                changes.push(ChangedField {
                    field: key.clone(),
                    old: old_value,
                    new: Some(new_value.clone()),
                    changed_at: now,
                });
            }
        }

        *self = Self::from_fields(self.step(), merged);
        changes
    }
}

fn step_tag(step: Step) -> &'static str {
    match step {
        Step::Registration => "registration",
        Step::InitialAssessment => "initial_assessment",
        Step::VisionTesting => "vision_testing",
        Step::AutoRefraction => "auto_refraction",
        Step::ClinicalEvaluation => "clinical_evaluation",
        Step::DoctorDiagnosis => "doctor_diagnosis",
        Step::Prescription => "prescription",
        Step::QualityCheck => "quality_check",
        Step::FinalApproval => "final_approval",
        Step::Completed => "completed",
    }
}
