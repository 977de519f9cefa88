//! Atomic three-window admission check for a single credential.

use std::sync::Arc;

use tracing::{trace, warn};
use uuid::Uuid;

use super::credential::Credential;
use super::store::{AdmissionRequest, AdmissionStore, WindowCheck};
use super::window::{Dimension, DimensionStatus};
use crate::config::RateLimitingConfig;

/// Outcome of one credential's admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckOutcome {
    /// Whether the event was admitted and recorded
    pub admitted: bool,
    /// Seconds until the slowest saturated window clears; 0 when admitted
    pub wait_secs: f64,
}

impl CheckOutcome {
    pub fn admitted() -> Self {
        Self {
            admitted: true,
            wait_secs: 0.0,
        }
    }

    pub fn rejected(wait_secs: f64) -> Self {
        Self {
            admitted: false,
            wait_secs,
        }
    }
}

/// Reduce per-dimension statuses into one outcome.
///
/// Admitted only if every dimension is admissible. Otherwise the wait is the
/// largest wait among the saturated dimensions, since the caller has to wait
/// for the slowest one to clear.
pub fn fold_statuses<I>(statuses: I) -> CheckOutcome
where
    I: IntoIterator<Item = DimensionStatus>,
{
    let mut blocked = false;
    let mut max_wait = 0.0_f64;

    for status in statuses {
        if let DimensionStatus::Saturated { wait_secs } = status {
            blocked = true;
            max_wait = max_wait.max(wait_secs);
        }
    }

    if blocked {
        CheckOutcome::rejected(max_wait)
    } else {
        CheckOutcome::admitted()
    }
}

/// Runs the atomic admission check for credentials against a shared store.
pub struct AdmissionCheck {
    store: Arc<dyn AdmissionStore>,
    config: RateLimitingConfig,
}

impl AdmissionCheck {
    pub fn new(store: Arc<dyn AdmissionStore>, config: RateLimitingConfig) -> Self {
        Self { store, config }
    }

    /// Build the store request for `credential` at `now`.
    pub fn request_for(&self, credential: &Credential, now: f64) -> AdmissionRequest {
        let window = |dimension: Dimension| WindowCheck {
            dimension,
            key: self.config.window_key(&credential.id, dimension),
            max: credential.limit(dimension),
            window_secs: self.config.window_secs(dimension),
        };

        AdmissionRequest {
            credential_id: credential.id.clone(),
            now,
            member: format!("{}:{}", now, Uuid::new_v4()),
            windows: [
                window(Dimension::Requests),
                window(Dimension::UnitsPerMinute),
                window(Dimension::UnitsPerDay),
            ],
        }
    }

    /// Check `credential` at `now`, recording the event if admitted.
    ///
    /// Fails closed: if the store cannot run the check, the credential is
    /// reported as rejected with a zero wait instead of returning the error.
    /// Callers retry immediately; nothing is admitted or recorded while the
    /// store is unreachable.
    pub async fn check(&self, credential: &Credential, now: f64) -> CheckOutcome {
        let request = self.request_for(credential, now);

        match self.store.check_and_record(&request).await {
            Ok(outcome) => {
                trace!(
                    credential = %credential.id,
                    admitted = outcome.admitted,
                    wait_secs = outcome.wait_secs,
                    "Admission check completed"
                );
                outcome
            }
            Err(e) => {
                warn!(
                    credential = %credential.id,
                    error = %e,
                    "Admission check failed, treating credential as unavailable"
                );
                CheckOutcome::rejected(0.0)
            }
        }
    }

    pub fn config(&self) -> &RateLimitingConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn AdmissionStore> {
        &self.store
    }
}
