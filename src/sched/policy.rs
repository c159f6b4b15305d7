//! Priority assignment policies over the process table.
//!
//! Policies are stateless functions: they sort or partition the table,
//! compute target priorities, record them, and push them through the
//! actuator. Suspended records are never reassigned; system processes are
//! excluded everywhere except the confirming `priority` pass.

use super::Algorithm;
use crate::sys::actuator::{Actuate, PRIORITY_MAX, PRIORITY_MIN};
use crate::sys::probe::ProcessRecord;

/// Hybrid bucket boundaries: (start, ceiling) nice values per class.
const INTERACTIVE_BAND: (i32, i32) = (-15, -10);
const IO_BOUND_BAND: (i32, i32) = (-5, 0);
const BACKGROUND_BAND: (i32, i32) = (5, 10);
const CPU_BOUND_BAND: (i32, i32) = (10, 19);

/// CPU% above which a process counts as cpu-bound.
const CPU_BOUND_PCT: f64 = 70.0;

/// CPU% below which a process counts as io-bound.
const IO_BOUND_PCT: f64 = 20.0;

/// Apply the selected algorithm to the table. May reorder it.
pub fn apply_algorithm(
    records: &mut Vec<ProcessRecord>,
    algorithm: Algorithm,
    actuator: &dyn Actuate,
) {
    match algorithm {
        Algorithm::Fcfs => fcfs(records, actuator),
        Algorithm::Sjf => sjf(records, actuator),
        Algorithm::Priority => confirm_priorities(records, actuator),
        Algorithm::RoundRobin => round_robin(records, actuator),
        Algorithm::Hybrid => hybrid(records, actuator),
    }
}

/// First-come-first-served: earlier pids get more-favored priorities.
fn fcfs(records: &mut [ProcessRecord], actuator: &dyn Actuate) {
    records.sort_by_key(|r| r.pid);
    assign_ladder(records, actuator);
}

/// Shortest-job-first: less accumulated CPU time gets more-favored
/// priorities.
fn sjf(records: &mut [ProcessRecord], actuator: &dyn Actuate) {
    records.sort_by_key(|r| r.cpu_ticks_cumulative);
    assign_ladder(records, actuator);
}

/// Walk eligible records in table order, handing out priorities from the
/// floor upwards, one step per record, saturating at the cap.
fn assign_ladder(records: &mut [ProcessRecord], actuator: &dyn Actuate) {
    let mut priority = PRIORITY_MIN;
    for rec in records
        .iter_mut()
        .filter(|r| !r.is_suspended && !r.is_system)
    {
        rec.priority = priority;
        let _ = actuator.set_priority(rec.pid, priority);
        priority = (priority + 1).min(PRIORITY_MAX);
    }
}

/// Reassert every record's own priority, lowest first.
///
/// Unlike the other policies this pass includes system processes: it changes
/// nothing, it only re-applies what the table already holds, so confirming
/// infrastructure pids is harmless and keeps the pass uniform. Suspended
/// records are still skipped.
fn confirm_priorities(records: &mut [ProcessRecord], actuator: &dyn Actuate) {
    records.sort_by_key(|r| r.priority);
    for rec in records.iter().filter(|r| !r.is_suspended) {
        let _ = actuator.set_priority(rec.pid, rec.priority);
    }
}

/// Round-robin: every eligible record runs at the neutral priority.
fn round_robin(records: &mut [ProcessRecord], actuator: &dyn Actuate) {
    for rec in records
        .iter_mut()
        .filter(|r| !r.is_suspended && !r.is_system)
    {
        rec.priority = 0;
        let _ = actuator.set_priority(rec.pid, 0);
    }
}

/// Bucket by interactivity and CPU appetite, then ladder within each bucket.
///
/// Foreground records are interactive regardless of load; the rest split on
/// CPU%: above [`CPU_BOUND_PCT`] cpu-bound, below [`IO_BOUND_PCT`] io-bound,
/// the middle band background. Bucket order within the table is preserved.
fn hybrid(records: &mut [ProcessRecord], actuator: &dyn Actuate) {
    if records.is_empty() {
        return;
    }

    let mut interactive = Vec::new();
    let mut io_bound = Vec::new();
    let mut cpu_bound = Vec::new();
    let mut background = Vec::new();

    for (idx, rec) in records.iter().enumerate() {
        if rec.is_suspended || rec.is_system {
            continue;
        }
        if rec.is_foreground {
            interactive.push(idx);
        } else if rec.cpu_percent > CPU_BOUND_PCT {
            cpu_bound.push(idx);
        } else if rec.cpu_percent < IO_BOUND_PCT {
            io_bound.push(idx);
        } else {
            background.push(idx);
        }
    }

    assign_band(records, &interactive, INTERACTIVE_BAND, actuator);
    assign_band(records, &io_bound, IO_BOUND_BAND, actuator);
    assign_band(records, &background, BACKGROUND_BAND, actuator);
    assign_band(records, &cpu_bound, CPU_BOUND_BAND, actuator);
}

fn assign_band(
    records: &mut [ProcessRecord],
    indices: &[usize],
    (start, ceiling): (i32, i32),
    actuator: &dyn Actuate,
) {
    let mut priority = start;
    for &idx in indices {
        let rec = &mut records[idx];
        rec.priority = priority;
        let _ = actuator.set_priority(rec.pid, priority);
        priority = (priority + 1).min(ceiling);
    }
}
