//! Mode envelope: per-mode priority shifts and suspension intents.

use super::Mode;
use crate::sys::actuator::Actuate;
use crate::sys::probe::ProcessRecord;

/// Apply the selected mode to every record in the table.
///
/// Each record gets a shifted priority and a suspend intent, then both are
/// pushed through the actuator. System processes never receive a mode-driven
/// suspend; a record suspended under power-saving stays parked until another
/// mode resumes it or memory relief does. Per-pid failures are swallowed and
/// the walk continues.
pub fn apply_mode(
    records: &mut [ProcessRecord],
    mode: Mode,
    threshold_mb: f64,
    actuator: &dyn Actuate,
) {
    let threshold_bytes = (threshold_mb * 1024.0 * 1024.0) as u64;

    for rec in records.iter_mut() {
        if rec.pid <= 0 {
            continue;
        }

        let mut priority = rec.priority;
        let mut should_suspend = false;

        match mode {
            Mode::Gaming => {
                if rec.is_foreground {
                    priority = (priority - 5).max(-15);
                } else if !rec.is_system {
                    priority = (priority + 5).min(15);
                }
            }
            Mode::Productivity => {
                if rec.is_foreground {
                    priority = (priority - 3).max(-10);
                } else if !rec.is_system {
                    priority = (priority + 2).min(10);
                }
            }
            Mode::PowerSaving => {
                if !rec.is_system {
                    priority = (priority + 5).min(19);
                    if rec.memory_bytes > threshold_bytes && !rec.is_foreground {
                        should_suspend = true;
                    }
                }
            }
        }

        rec.priority = priority;

        if actuator.set_priority(rec.pid, priority).is_err() {
            // The process likely raced us out of existence or is off-limits;
            // skip its run-state transition as well.
            continue;
        }

        if should_suspend && !rec.is_suspended {
            if actuator.suspend(rec.pid).is_ok() {
                rec.is_suspended = true;
            }
        } else if !should_suspend && rec.is_suspended && mode != Mode::PowerSaving {
            if actuator.resume(rec.pid).is_ok() {
                rec.is_suspended = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys::actuator::fake::{Call, RecordingActuator};

    fn record(pid: i32, priority: i32) -> ProcessRecord {
        ProcessRecord {
            pid,
            name: format!("proc-{pid}"),
            is_system: false,
            is_foreground: false,
            is_suspended: false,
            priority,
            memory_bytes: 0,
            cpu_percent: 0.0,
            cpu_ticks_cumulative: 0,
        }
    }

    #[test]
    fn test_gaming_clamps_foreground_boost() {
        let actuator = RecordingActuator::new();
        let mut table = vec![record(2000, -18)];
        table[0].is_foreground = true;

        apply_mode(&mut table, Mode::Gaming, 200.0, &actuator);

        // max(-15, -18 - 5) exercises the clamp floor.
        assert_eq!(table[0].priority, -15);
        assert_eq!(actuator.calls(), vec![Call::SetPriority(2000, -15)]);
    }

    #[test]
    fn test_gaming_deprioritizes_background() {
        let actuator = RecordingActuator::new();
        let mut table = vec![record(2000, 13)];

        apply_mode(&mut table, Mode::Gaming, 200.0, &actuator);

        assert_eq!(table[0].priority, 15); // min(15, 13 + 5)
    }

    #[test]
    fn test_productivity_shifts() {
        let actuator = RecordingActuator::new();
        let mut table = vec![record(2000, 0), record(2001, 9)];
        table[0].is_foreground = true;

        apply_mode(&mut table, Mode::Productivity, 200.0, &actuator);

        assert_eq!(table[0].priority, -3);
        assert_eq!(table[1].priority, 10); // min(10, 9 + 2)
    }

    #[test]
    fn test_system_processes_are_untouched() {
        let actuator = RecordingActuator::new();
        let mut table = vec![record(400, 0)];
        table[0].is_system = true;

        apply_mode(&mut table, Mode::Gaming, 200.0, &actuator);
        apply_mode(&mut table, Mode::PowerSaving, 200.0, &actuator);

        assert_eq!(table[0].priority, 0);
        assert!(!table[0].is_suspended);
        // Priority is still reasserted, but no run-state changes.
        assert_eq!(
            actuator.calls(),
            vec![Call::SetPriority(400, 0), Call::SetPriority(400, 0)]
        );
    }

    #[test]
    fn test_power_saving_parks_heavy_background() {
        let actuator = RecordingActuator::new();
        let mut table = vec![record(2000, 0), record(2001, 0), record(2002, 0)];
        table[0].memory_bytes = 300 * 1024 * 1024;
        table[1].memory_bytes = 300 * 1024 * 1024;
        table[1].is_foreground = true;
        table[2].memory_bytes = 100 * 1024 * 1024;

        apply_mode(&mut table, Mode::PowerSaving, 200.0, &actuator);

        assert!(table[0].is_suspended);
        assert!(!table[1].is_suspended); // foreground is spared
        assert!(!table[2].is_suspended); // below the threshold
        assert!(actuator.calls().contains(&Call::Suspend(2000)));
        assert!(!actuator.calls().contains(&Call::Suspend(2001)));
    }

    #[test]
    fn test_leaving_power_saving_resumes() {
        let actuator = RecordingActuator::new();
        let mut table = vec![record(2000, 5)];
        table[0].is_suspended = true;

        apply_mode(&mut table, Mode::Productivity, 200.0, &actuator);

        assert!(!table[0].is_suspended);
        assert!(actuator.calls().contains(&Call::Resume(2000)));
    }

    #[test]
    fn test_power_saving_keeps_parked_processes_parked() {
        let actuator = RecordingActuator::new();
        let mut table = vec![record(2000, 5)];
        table[0].is_suspended = true;
        table[0].memory_bytes = 10 * 1024 * 1024; // no longer over threshold

        apply_mode(&mut table, Mode::PowerSaving, 200.0, &actuator);

        assert!(table[0].is_suspended);
        assert!(!actuator.calls().iter().any(|c| matches!(c, Call::Resume(_))));
    }

    #[test]
    fn test_priority_failure_skips_run_state_change() {
        let actuator = RecordingActuator::new();
        actuator.fail_pid(2000);
        let mut table = vec![record(2000, 0), record(2001, 0)];
        table[0].memory_bytes = 300 * 1024 * 1024;
        table[1].memory_bytes = 300 * 1024 * 1024;

        apply_mode(&mut table, Mode::PowerSaving, 200.0, &actuator);

        // The failed pid is skipped, the walk continues.
        assert!(!table[0].is_suspended);
        assert!(table[1].is_suspended);
    }
}
