//! Opaque identifier types handed out for sessions, log entries, approval
//! requests, and locks.
//!
//! Uniqueness is the only contract — time-ordering is not required, so
//! these simply wrap `Uuid::new_v4`.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

opaque_id!(SessionId);
opaque_id!(LogId);
opaque_id!(ApprovalRequestId);
opaque_id!(LockId);

/// Patient identifiers are opaque strings owned by the patient-lookup
/// collaborator — not minted here.
pub type PatientId = String;

/// User identifiers are opaque strings owned by the identity collaborator.
pub type UserId = String;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn ids_round_trip_through_json() {
        let id = LogId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: LogId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
