//! Credential rotation over a shared cursor.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::check::AdmissionCheck;
use super::credential::Credential;
use super::decision::AdmissionDecision;
use crate::error::{KeygateError, Result};

/// An ordered pool of credentials scanned from a shared rotation cursor.
pub struct CredentialPool {
    /// Credential ids in rotation order
    order: Vec<String>,
    /// Limits registered for each credential id
    credentials: HashMap<String, Credential>,
    /// The per-credential admission check
    check: AdmissionCheck,
    /// Store key of the rotation cursor
    cursor_key: String,
}

impl CredentialPool {
    /// Create a pool. Fails if `credentials` is empty or repeats an id.
    pub fn new(credentials: Vec<Credential>, check: AdmissionCheck) -> Result<Self> {
        if credentials.is_empty() {
            return Err(KeygateError::Config(
                "at least one credential is required".to_string(),
            ));
        }

        let mut order = Vec::with_capacity(credentials.len());
        let mut registered = HashMap::with_capacity(credentials.len());
        for credential in credentials {
            if registered.contains_key(&credential.id) {
                return Err(KeygateError::Config(format!(
                    "duplicate credential id: {}",
                    credential.id
                )));
            }
            order.push(credential.id.clone());
            registered.insert(credential.id.clone(), credential);
        }

        let cursor_key = check.config().cursor_key();
        Ok(Self {
            order,
            credentials: registered,
            check,
            cursor_key,
        })
    }

    /// Number of credentials in the pool.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Credential ids in rotation order.
    pub fn credential_ids(&self) -> &[String] {
        &self.order
    }

    /// Limits registered for `id`.
    pub fn credential(&self, id: &str) -> Option<&Credential> {
        self.credentials.get(id)
    }

    pub fn check(&self) -> &AdmissionCheck {
        &self.check
    }

    /// Current cursor position, reduced into range.
    ///
    /// A missing value reads as 0. An unreadable or unparsable value also
    /// reads as 0, so a store fault here never blocks a scan.
    pub async fn cursor(&self) -> usize {
        let raw = match self.check.store().load_cursor(&self.cursor_key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %self.cursor_key, error = %e, "Failed to read rotation cursor");
                None
            }
        };

        let index = match raw {
            None => 0,
            Some(value) => value.trim().parse::<usize>().unwrap_or_else(|_| {
                warn!(key = %self.cursor_key, value = %value, "Ignoring malformed rotation cursor");
                0
            }),
        };

        index % self.len()
    }

    async fn set_cursor(&self, index: usize) {
        if let Err(e) = self
            .check
            .store()
            .store_cursor(&self.cursor_key, &index.to_string())
            .await
        {
            warn!(key = %self.cursor_key, index, error = %e, "Failed to store rotation cursor");
        }
    }

    /// Scan the pool once, starting at the cursor and wrapping around.
    ///
    /// On admission the cursor moves to the admitting credential, so the next
    /// scan starts with it again. If every credential is exhausted the cursor
    /// advances by exactly one position and the smallest wait seen is
    /// returned.
    pub async fn scan(&self, now: f64) -> Result<AdmissionDecision> {
        let count = self.len();
        let start = self.cursor().await;
        let mut min_wait = f64::INFINITY;

        for offset in 0..count {
            let index = (start + offset) % count;
            let id = &self.order[index];
            let credential = self.credentials.get(id).ok_or_else(|| {
                KeygateError::Config(format!("no limits registered for credential {}", id))
            })?;

            let outcome = self.check.check(credential, now).await;
            if outcome.admitted {
                self.set_cursor(index).await;
                debug!(credential = %id, index, "Credential admitted request");
                return Ok(AdmissionDecision::admitted(id.clone()));
            }

            min_wait = min_wait.min(outcome.wait_secs);
        }

        let next = (start + 1) % count;
        self.set_cursor(next).await;
        debug!(
            cursor = next,
            wait_secs = min_wait,
            "All credentials exhausted"
        );

        Ok(AdmissionDecision::rejected(min_wait))
    }
}
