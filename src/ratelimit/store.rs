//! Shared store abstraction.

use async_trait::async_trait;

use super::check::CheckOutcome;
use super::window::Dimension;
use crate::error::Result;

/// One window to evaluate as part of an admission request.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowCheck {
    /// Which ceiling this window enforces
    pub dimension: Dimension,
    /// Store key holding the window's timestamps
    pub key: String,
    /// Maximum events allowed inside the window
    pub max: u64,
    /// Window length in seconds
    pub window_secs: f64,
}

/// Everything a store needs to run one atomic admission check.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionRequest {
    /// Credential the windows belong to
    pub credential_id: String,
    /// Single timestamp shared by every window in the request
    pub now: f64,
    /// Unique member name for the event recorded on admission
    pub member: String,
    /// The request, per-minute and per-day windows, in that order
    pub windows: [WindowCheck; 3],
}

/// Trait for stores that can run the admission check atomically.
///
/// `check_and_record` must evaluate every window and, only when all of them
/// are admissible, record the event in all of them, with no other caller's
/// check for the same credential interleaving. Cursor access is a separate,
/// independently atomic operation.
#[async_trait]
pub trait AdmissionStore: Send + Sync {
    /// Evaluate all windows and record the event if every one admits it.
    async fn check_and_record(&self, request: &AdmissionRequest) -> Result<CheckOutcome>;

    /// Read the rotation cursor value, if any has been stored.
    async fn load_cursor(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite the rotation cursor value.
    async fn store_cursor(&self, key: &str, value: &str) -> Result<()>;

    /// Count the non-expired events in a window without modifying it.
    async fn occupancy(&self, key: &str, window_secs: f64, now: f64) -> Result<u64>;
}
