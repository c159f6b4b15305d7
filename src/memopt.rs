//! Pressure-triggered suspension of heavyweight background processes.
//!
//! The optimizer is hysteretic: suspensions fire only above the pressure
//! thresholds, resumes only below the relief thresholds, and the band in
//! between is a dead zone where neither rule acts.

use tracing::debug;

use crate::sys::actuator::Actuate;
use crate::sys::probe::ProcessRecord;

/// Memory% above which the suspend rule fires.
pub const MEM_PRESSURE_PCT: f64 = 90.0;

/// Swap% above which the suspend rule fires.
pub const SWAP_PRESSURE_PCT: f64 = 70.0;

/// Memory% below which the resume rule fires.
pub const MEM_RELIEF_PCT: f64 = 70.0;

/// Swap% below which the resume rule fires.
pub const SWAP_RELIEF_PCT: f64 = 50.0;

/// Successful suspensions allowed in a single round.
pub const MAX_SUSPENSIONS_PER_ROUND: usize = 3;

/// What the optimizer did this round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeOutcome {
    pub suspended: usize,
    pub resumed: usize,
}

/// Suspend or resume processes according to the current pressure readings.
///
/// Under pressure the biggest non-system, non-foreground, not-yet-suspended
/// records over the threshold are stopped, at most
/// [`MAX_SUSPENSIONS_PER_ROUND`] per round. Under relief every suspended
/// non-system record is continued. Per-pid actuation failures are skipped
/// silently and do not count against the cap. Sorts the table by resident
/// size descending when the suspend rule fires.
pub fn optimize(
    records: &mut Vec<ProcessRecord>,
    threshold_mb: f64,
    mem_pct: f64,
    swap_pct: f64,
    actuator: &dyn Actuate,
) -> OptimizeOutcome {
    let mut outcome = OptimizeOutcome::default();

    if mem_pct > MEM_PRESSURE_PCT || swap_pct > SWAP_PRESSURE_PCT {
        let threshold_bytes = (threshold_mb * 1024.0 * 1024.0) as u64;
        records.sort_by(|a, b| b.memory_bytes.cmp(&a.memory_bytes));

        for rec in records.iter_mut() {
            if rec.is_system || rec.is_suspended || rec.is_foreground {
                continue;
            }
            if rec.memory_bytes <= threshold_bytes {
                continue;
            }
            if actuator.suspend(rec.pid).is_ok() {
                rec.is_suspended = true;
                outcome.suspended += 1;
                debug!(
                    pid = rec.pid,
                    name = %rec.name,
                    mb = rec.memory_mb() as u64,
                    "suspended under memory pressure"
                );
                if outcome.suspended >= MAX_SUSPENSIONS_PER_ROUND {
                    break;
                }
            }
        }
    }

    if mem_pct < MEM_RELIEF_PCT && swap_pct < SWAP_RELIEF_PCT {
        for rec in records.iter_mut() {
            if rec.is_suspended && !rec.is_system {
                if actuator.resume(rec.pid).is_ok() {
                    rec.is_suspended = false;
                    outcome.resumed += 1;
                }
            }
        }
    }

    outcome
}
