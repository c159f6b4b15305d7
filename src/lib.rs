//! procgov - user-space resource governor for Linux-like hosts
//!
//! Periodically enumerates running processes, classifies them, and adjusts
//! their scheduling priority - and, under memory pressure, their run/stop
//! state - according to an operating mode and a scheduling policy.
//!
//! ## Features
//!
//! - **Operating modes**: gaming, productivity and power-saving envelopes
//!   that shift priorities and may park heavyweight background processes
//! - **Scheduling policies**: FCFS, SJF, priority-confirming, round-robin
//!   and a hybrid bucket scheme over interactivity and CPU appetite
//! - **Memory optimizer**: hysteretic suspend/resume under memory and swap
//!   pressure, capped per round
//! - **Snapshot API**: consistent value-copy views of the process table and
//!   rolling performance statistics while the worker keeps mutating state
//!
//! ## Safety
//!
//! - Priorities are clamped to the valid nice range before every actuation
//! - System processes are never suspended; terminating pid 1 is refused
//! - Unprivileged operation degrades gracefully to typed permission failures

pub mod core;
pub mod memopt;
pub mod sched;
pub mod sys;

// Re-exports
pub use crate::core::config::GovernorConfig;
pub use crate::core::governor::Governor;
pub use crate::core::journal::Journal;
pub use crate::core::telemetry::{CategoryCounts, PerformanceStats, Telemetry};
pub use crate::memopt::OptimizeOutcome;
pub use crate::sched::{Algorithm, Mode};
pub use crate::sys::{
    is_elevated, Actuate, ActuationError, ProcessRecord, SysActuator, SystemProbe, SystemSnapshot,
};
