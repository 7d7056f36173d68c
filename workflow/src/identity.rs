//! Identity and patient-lookup collaborators.
//!
//! The engine treats both as external services it depends on through a
//! trait, never as something it resolves itself — `api` owns the concrete
//! bearer-token decoding, `storage` (or a test double here) owns patient
//! records.

use crate::ids::PatientId;
use crate::model::Role;
use async_trait::async_trait;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
    pub role: Role,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, token: &str) -> Option<Identity>;
}

#[derive(Debug, Clone)]
pub struct PatientRecord {
    pub patient_id: PatientId,
    pub display_name: String,
}

#[async_trait]
pub trait PatientLookup: Send + Sync {
    async fn lookup(&self, patient_id: &PatientId) -> Option<PatientRecord>;
}

/// Fixed-table identity provider for tests and local/offline deployments
/// where an external directory isn't wired up.
#[derive(Debug, Default)]
pub struct StaticIdentityProvider {
    by_token: HashMap<String, Identity>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.by_token.insert(token.into(), identity);
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve(&self, token: &str) -> Option<Identity> {
        self.by_token.get(token).cloned()
    }
}

#[derive(Debug, Default)]
pub struct StaticPatientLookup {
    by_id: HashMap<PatientId, PatientRecord>,
}

impl StaticPatientLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patient(mut self, record: PatientRecord) -> Self {
        self.by_id.insert(record.patient_id.clone(), record);
        self
    }
}

#[async_trait]
impl PatientLookup for StaticPatientLookup {
    async fn lookup(&self, patient_id: &PatientId) -> Option<PatientRecord> {
        self.by_id.get(patient_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_identity_provider_resolves_known_token() {
        let provider = StaticIdentityProvider::new().with_user(
            "tok-1",
            Identity {
                user_id: "u1".to_string(),
                display_name: "Dr. A".to_string(),
                role: Role::Doctor,
            },
        );
        let identity = provider.resolve("tok-1").await.unwrap();
        assert_eq!(identity.user_id, "u1");
        assert!(provider.resolve("unknown").await.is_none());
    }

    #[tokio::test]
    async fn static_patient_lookup_resolves_known_id() {
        let lookup = StaticPatientLookup::new().with_patient(PatientRecord {
            patient_id: "p1".to_string(),
            display_name: "Jane Doe".to_string(),
        });
        assert!(lookup.lookup(&"p1".to_string()).await.is_some());
        assert!(lookup.lookup(&"p2".to_string()).await.is_none());
    }
}
