//! Request bodies and query parameters for the resource routes.

use serde::Deserialize;
use workflow::model::{Action, ApprovalPriority, LockType, Metadata, Step};

fn default_initial_step() -> Step {
    Step::Registration
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub patient_id: String,
    #[serde(default)]
    pub patient_display_name: Option<String>,
    #[serde(default = "default_initial_step")]
    pub initial_step: Step,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStepRequest {
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub complete: bool,
    #[serde(default)]
    pub request_approval: bool,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RequestApprovalRequest {
    pub step: Step,
    pub reason: String,
    #[serde(default)]
    pub data_snapshot: serde_json::Value,
    #[serde(default)]
    pub priority: Option<ApprovalPriority>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveApprovalRequest {
    pub approve: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LockSessionRequest {
    #[serde(default)]
    pub step: Option<Step>,
    pub lock_type: LockType,
    pub reason: String,
    #[serde(default)]
    pub duration_hours: Option<i64>,
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, Deserialize)]
pub struct ListActivityQuery {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub step: Option<Step>,
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UnlockQuery {
    pub reason: String,
}
