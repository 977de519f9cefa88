//! In-process admission store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use super::check::{fold_statuses, CheckOutcome};
use super::store::{AdmissionRequest, AdmissionStore};
use super::window::{self, WindowRecord};
use crate::error::Result;

/// Window records of one credential, keyed by store key.
type CredentialWindows = HashMap<String, WindowRecord>;

/// An [`AdmissionStore`] that keeps all state in process memory.
///
/// Each credential's windows sit behind their own mutex, held only while a
/// check runs, so checks for different credentials never contend.
#[derive(Default)]
pub struct MemoryStore {
    /// Per-credential window groups
    credentials: DashMap<String, Arc<Mutex<CredentialWindows>>>,
    /// Window key -> owning credential, for read-only lookups by key
    owners: DashMap<String, String>,
    /// Plain string values (the rotation cursor)
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn windows_for(&self, credential_id: &str) -> Arc<Mutex<CredentialWindows>> {
        self.credentials
            .entry(credential_id.to_string())
            .or_default()
            .clone()
    }
}

#[async_trait]
impl AdmissionStore for MemoryStore {
    async fn check_and_record(&self, request: &AdmissionRequest) -> Result<CheckOutcome> {
        let group = self.windows_for(&request.credential_id);
        let mut windows = group.lock();

        let statuses: Vec<_> = request
            .windows
            .iter()
            .map(|check| {
                let record = windows.entry(check.key.clone()).or_default();
                window::evaluate(record, check.max, check.window_secs, request.now)
            })
            .collect();

        let outcome = fold_statuses(statuses);
        if outcome.admitted {
            for check in &request.windows {
                windows
                    .entry(check.key.clone())
                    .or_default()
                    .record(request.now, check.window_secs);
                self.owners
                    .entry(check.key.clone())
                    .or_insert_with(|| request.credential_id.clone());
            }
        }

        Ok(outcome)
    }

    async fn load_cursor(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn store_cursor(&self, key: &str, value: &str) -> Result<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn occupancy(&self, key: &str, window_secs: f64, now: f64) -> Result<u64> {
        let owner = match self.owners.get(key) {
            Some(owner) => owner.value().clone(),
            None => return Ok(0),
        };

        let group = self.windows_for(&owner);
        let windows = group.lock();
        Ok(windows
            .get(key)
            .map(|record| record.occupancy(now, window_secs) as u64)
            .unwrap_or(0))
    }
}
