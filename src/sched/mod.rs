//! Scheduling engine: operating modes and priority assignment policies.
//!
//! The two axes are orthogonal. A [`Mode`] is an envelope that shifts
//! priorities and may request suspension; an [`Algorithm`] is a stateless
//! priority assignment over the table, dispatched by tag at round time.

pub mod modes;
pub mod policy;

pub use modes::apply_mode;
pub use policy::apply_algorithm;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// User-selected operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Boost foreground applications, deprioritize background ones.
    Gaming,
    /// Balanced shifts in both directions.
    Productivity,
    /// Deprioritize everything non-system and park heavyweight background
    /// processes.
    PowerSaving,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Gaming => write!(f, "gaming"),
            Mode::Productivity => write!(f, "productivity"),
            Mode::PowerSaving => write!(f, "power-saving"),
        }
    }
}

/// Priority assignment policy applied each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// Earlier pids get more-favored priorities.
    Fcfs,
    /// Processes with less accumulated CPU time get more-favored priorities.
    Sjf,
    /// Reassert each process's current priority.
    Priority,
    /// Everyone runs at the neutral priority.
    RoundRobin,
    /// Bucket by interactivity and CPU appetite.
    Hybrid,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Fcfs => write!(f, "fcfs"),
            Algorithm::Sjf => write!(f, "sjf"),
            Algorithm::Priority => write!(f, "priority"),
            Algorithm::RoundRobin => write!(f, "round-robin"),
            Algorithm::Hybrid => write!(f, "hybrid"),
        }
    }
}
