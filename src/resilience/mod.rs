//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to decision service:
//!     → timeouts.rs (race the call against its deadline)
//!     → On timeout or transport failure: caller fails open
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline
//! - One attempt per request; no retries, no backoff
//! - The loser of a race is abandoned, never cancelled

pub mod timeouts;

pub use timeouts::{race_deadline, DeadlineError};
