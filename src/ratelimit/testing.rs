//! Store doubles shared by unit tests.

use async_trait::async_trait;

use super::check::CheckOutcome;
use super::store::{AdmissionRequest, AdmissionStore};
use crate::error::{KeygateError, Result};

/// A store that is always unreachable.
pub struct FailingStore;

fn unreachable_store() -> KeygateError {
    KeygateError::Store("connection refused".to_string())
}

#[async_trait]
impl AdmissionStore for FailingStore {
    async fn check_and_record(&self, _request: &AdmissionRequest) -> Result<CheckOutcome> {
        Err(unreachable_store())
    }

    async fn load_cursor(&self, _key: &str) -> Result<Option<String>> {
        Err(unreachable_store())
    }

    async fn store_cursor(&self, _key: &str, _value: &str) -> Result<()> {
        Err(unreachable_store())
    }

    async fn occupancy(&self, _key: &str, _window_secs: f64, _now: f64) -> Result<u64> {
        Err(unreachable_store())
    }
}
