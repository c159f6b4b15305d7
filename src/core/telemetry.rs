//! Rolling performance statistics over recent rounds.

use std::collections::VecDeque;

use serde::Serialize;

use crate::sys::probe::ProcessRecord;

/// Samples kept per rolling window.
pub const SAMPLE_WINDOW: usize = 100;

/// Process-category histogram for one round.
///
/// `background` counts records that are neither system nor foreground;
/// `suspended` is counted independently of the other three.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub system: usize,
    pub foreground: usize,
    pub background: usize,
    pub suspended: usize,
}

/// Aggregates over the rolling windows plus the current histogram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub avg_cpu_pct: f64,
    pub max_cpu_pct: f64,
    pub avg_mem_pct: f64,
    pub max_mem_pct: f64,
    pub total_processes: usize,
    pub suspended_processes: usize,
}

/// Rolling CPU/memory windows and a per-round category histogram.
#[derive(Debug, Default)]
pub struct Telemetry {
    cpu_samples: VecDeque<f64>,
    mem_samples: VecDeque<f64>,
    counts: CategoryCounts,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one round into the windows and rebuild the histogram.
    pub fn record(&mut self, records: &[ProcessRecord], mem_pct: f64, cpu_pct: f64) {
        push_capped(&mut self.cpu_samples, cpu_pct);
        push_capped(&mut self.mem_samples, mem_pct);

        let mut counts = CategoryCounts::default();
        for rec in records {
            if rec.is_system {
                counts.system += 1;
            } else if rec.is_foreground {
                counts.foreground += 1;
            } else {
                counts.background += 1;
            }
            if rec.is_suspended {
                counts.suspended += 1;
            }
        }
        self.counts = counts;
    }

    pub fn stats(&self) -> PerformanceStats {
        let (avg_cpu_pct, max_cpu_pct) = window_stats(&self.cpu_samples);
        let (avg_mem_pct, max_mem_pct) = window_stats(&self.mem_samples);
        PerformanceStats {
            avg_cpu_pct,
            max_cpu_pct,
            avg_mem_pct,
            max_mem_pct,
            total_processes: self.counts.system + self.counts.foreground + self.counts.background,
            suspended_processes: self.counts.suspended,
        }
    }

    /// Current-round category histogram.
    pub fn distribution(&self) -> CategoryCounts {
        self.counts
    }

    pub fn reset(&mut self) {
        self.cpu_samples.clear();
        self.mem_samples.clear();
        self.counts = CategoryCounts::default();
    }

    #[cfg(test)]
    fn window_len(&self) -> usize {
        self.cpu_samples.len()
    }
}

fn push_capped(window: &mut VecDeque<f64>, sample: f64) {
    window.push_back(sample);
    if window.len() > SAMPLE_WINDOW {
        window.pop_front();
    }
}

fn window_stats(window: &VecDeque<f64>) -> (f64, f64) {
    if window.is_empty() {
        return (0.0, 0.0);
    }
    let sum: f64 = window.iter().sum();
    let max = window.iter().cloned().fold(f64::MIN, f64::max);
    (sum / window.len() as f64, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pid: i32, system: bool, foreground: bool, suspended: bool) -> ProcessRecord {
        ProcessRecord {
            pid,
            name: format!("proc-{pid}"),
            is_system: system,
            is_foreground: foreground,
            is_suspended: suspended,
            priority: 0,
            memory_bytes: 0,
            cpu_percent: 0.0,
            cpu_ticks_cumulative: 0,
        }
    }

    #[test]
    fn test_empty_stats_are_zero() {
        let telemetry = Telemetry::new();
        assert_eq!(telemetry.stats(), PerformanceStats::default());
    }

    #[test]
    fn test_window_aggregates() {
        let mut telemetry = Telemetry::new();
        telemetry.record(&[], 40.0, 10.0);
        telemetry.record(&[], 60.0, 30.0);

        let stats = telemetry.stats();
        assert!((stats.avg_cpu_pct - 20.0).abs() < 1e-9);
        assert_eq!(stats.max_cpu_pct, 30.0);
        assert!((stats.avg_mem_pct - 50.0).abs() < 1e-9);
        assert_eq!(stats.max_mem_pct, 60.0);
    }

    #[test]
    fn test_window_evicts_oldest_beyond_cap() {
        let mut telemetry = Telemetry::new();
        for i in 0..(SAMPLE_WINDOW + 20) {
            telemetry.record(&[], 0.0, i as f64);
        }
        assert_eq!(telemetry.window_len(), SAMPLE_WINDOW);
        // The first 20 samples are gone; the minimum surviving value is 20.
        let stats = telemetry.stats();
        assert!(stats.avg_cpu_pct >= 20.0);
    }

    #[test]
    fn test_histogram_is_replaced_wholesale() {
        let mut telemetry = Telemetry::new();
        telemetry.record(
            &[
                record(1, true, false, false),
                record(2, false, true, false),
                record(3, false, false, true),
                record(4, false, false, false),
            ],
            0.0,
            0.0,
        );
        assert_eq!(
            telemetry.distribution(),
            CategoryCounts { system: 1, foreground: 1, background: 2, suspended: 1 }
        );
        assert_eq!(telemetry.stats().total_processes, 4);
        assert_eq!(telemetry.stats().suspended_processes, 1);

        telemetry.record(&[record(5, false, false, false)], 0.0, 0.0);
        assert_eq!(
            telemetry.distribution(),
            CategoryCounts { system: 0, foreground: 0, background: 1, suspended: 0 }
        );
    }

    #[test]
    fn test_reset() {
        let mut telemetry = Telemetry::new();
        telemetry.record(&[record(1, false, false, false)], 50.0, 50.0);
        telemetry.reset();
        assert_eq!(telemetry.stats(), PerformanceStats::default());
        assert_eq!(telemetry.distribution(), CategoryCounts::default());
    }
}
