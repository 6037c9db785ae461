//! Contention suite: guarded and optimistic callers racing on one account.
//!
//! Every test runs on paused tokio time, so timeouts, TTLs and retry pauses
//! are exact and the interleavings are reproducible.

mod atomicity;
mod conflicts;
mod exclusion;
mod lost_update;
mod optimistic;
mod support;
mod timeouts;
