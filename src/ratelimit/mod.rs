//! Sliding-window admission control and credential rotation.

mod check;
mod clock;
mod credential;
mod decision;
mod limiter;
mod memory;
mod pool;
mod store;
mod window;

#[cfg(feature = "redis-store")]
mod redis_store;

#[cfg(test)]
mod testing;

pub use check::{fold_statuses, AdmissionCheck, CheckOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use credential::Credential;
pub use decision::AdmissionDecision;
pub use limiter::{CredentialUsage, RateLimiter};
pub use memory::MemoryStore;
pub use pool::CredentialPool;
pub use store::{AdmissionRequest, AdmissionStore, WindowCheck};
pub use window::{Dimension, DimensionStatus, WindowRecord};

#[cfg(feature = "redis-store")]
pub use redis_store::RedisStore;
