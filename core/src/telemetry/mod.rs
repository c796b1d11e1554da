//! telemetry/mod.rs
//! Per-envelope counters, stage timers and immutable snapshots.
//!
//! Industry notes:
//! - Expansion ratio (envelope bytes / plaintext bytes) is the format's
//!   overhead metric; it drops toward 1.0 as payloads grow.
//! - Snapshots are plain serde structs so they can be exported as JSON.

pub mod counters;
pub mod timers;
pub mod snapshot;

pub use counters::*;
pub use timers::*;
pub use snapshot::*;
