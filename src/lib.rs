//! Keygate - sliding-window admission control for pools of API credentials
//!
//! Each credential carries three ceilings: a request count over a short
//! window, a unit volume per minute and a unit volume per day. A
//! [`RateLimiter`](ratelimit::RateLimiter) scans the pool from a shared
//! rotation cursor and admits a request under the first credential whose
//! windows all have room. Windows and cursor live in a shared
//! [`AdmissionStore`](ratelimit::AdmissionStore), which runs each
//! credential's check-and-record step atomically.

pub mod config;
pub mod error;
pub mod ratelimit;
