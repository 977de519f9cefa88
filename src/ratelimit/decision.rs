//! The decision returned to callers of `acquire`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Whether a request may proceed, and under which credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionDecision {
    /// The request was admitted and recorded against `credential_id`
    pub admitted: bool,
    /// Lower-bound estimate of how long to wait before retrying.
    /// Only meaningful when `admitted` is false.
    pub wait_seconds: f64,
    /// The admitting credential, if any
    pub credential_id: Option<String>,
}

impl AdmissionDecision {
    /// An admission under `credential_id`.
    pub fn admitted(credential_id: impl Into<String>) -> Self {
        Self {
            admitted: true,
            wait_seconds: 0.0,
            credential_id: Some(credential_id.into()),
        }
    }

    /// A rejection across the whole pool.
    pub fn rejected(wait_seconds: f64) -> Self {
        Self {
            admitted: false,
            wait_seconds,
            credential_id: None,
        }
    }

    /// The wait as a [`Duration`], zero when admitted.
    pub fn wait(&self) -> Duration {
        if self.admitted || !self.wait_seconds.is_finite() {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.wait_seconds.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admitted_has_no_wait() {
        let decision = AdmissionDecision::admitted("api_key_1");

        assert!(decision.admitted);
        assert_eq!(decision.credential_id.as_deref(), Some("api_key_1"));
        assert_eq!(decision.wait(), Duration::ZERO);
    }

    #[test]
    fn test_rejected_wait_duration() {
        let decision = AdmissionDecision::rejected(1.5);

        assert!(!decision.admitted);
        assert_eq!(decision.credential_id, None);
        assert_eq!(decision.wait(), Duration::from_millis(1500));
    }

    #[test]
    fn test_serialize() {
        let json = serde_json::to_value(AdmissionDecision::rejected(2.0)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"admitted": false, "wait_seconds": 2.0, "credential_id": null})
        );
    }
}
