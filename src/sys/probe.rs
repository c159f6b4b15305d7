//! Read-only system and process probing over a procfs tree.
//!
//! The probe extracts system CPU/memory/swap percentages and a per-process
//! table from a procfs-like directory (normally `/proc`). It is deterministic
//! given its inputs; the only state it carries between snapshots is the
//! previous tick/time samples needed to turn cumulative counters into rates.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Pids below this are treated as infrastructure.
///
/// Coarse by design; on hosts with a remapped pid space the cutoff and the
/// name patterns below are the knobs to adjust.
pub const SYSTEM_PID_CUTOFF: i32 = 1000;

/// Name fragment marking a kernel worker thread (only when sleeping).
pub const KERNEL_WORKER_PATTERN: &str = "kworker";

/// Name fragments that always classify a process as system-owned.
pub const SYSTEM_NAME_PATTERNS: &[&str] = &["systemd", "kthreadd"];

/// Minimum elapsed wall time between effective rate samples.
const MIN_SAMPLE_SECS: f64 = 0.1;

/// One observed process in the current round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: i32,
    /// Short command name from the stat record.
    pub name: String,
    /// Kernel worker, init-like supervisor, or low-pid infrastructure.
    pub is_system: bool,
    /// Has a controlling terminal.
    pub is_foreground: bool,
    /// Observed in the stopped state.
    pub is_suspended: bool,
    /// Nice value in [-20, 19]; lower is more favored.
    pub priority: i32,
    /// Resident set size in bytes.
    pub memory_bytes: u64,
    /// Share of one logical CPU over the interval since the previous sample,
    /// clamped to [0, 100]. Zero until a pid has been sampled twice.
    pub cpu_percent: f64,
    /// Cumulative user + system ticks since process start.
    pub cpu_ticks_cumulative: u64,
}

impl ProcessRecord {
    pub fn memory_mb(&self) -> f64 {
        self.memory_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// System-wide usage percentages for one round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub mem_used_pct: f64,
    pub swap_used_pct: f64,
    pub cpu_used_pct: f64,
}

/// Fields of interest from one stat line.
#[derive(Debug, Clone, PartialEq)]
struct StatFields {
    name: String,
    state: char,
    tty_nr: i32,
    utime: u64,
    stime: u64,
}

#[derive(Debug, Clone, Copy)]
struct ProcSample {
    ticks: u64,
    at: Instant,
}

#[derive(Debug, Clone, Copy)]
struct CpuBaseline {
    total: u64,
    idle: u64,
    at: Instant,
}

/// Probe over a procfs tree, with owned inter-round sample memory.
pub struct SystemProbe {
    root: PathBuf,
    ticks_per_second: f64,
    proc_samples: HashMap<i32, ProcSample>,
    cpu_baseline: Option<CpuBaseline>,
}

impl SystemProbe {
    /// Probe against the live `/proc`.
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Probe against an arbitrary procfs-like tree.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ticks_per_second: ticks_per_second(),
            proc_samples: HashMap::new(),
            cpu_baseline: None,
        }
    }

    /// System-wide memory, swap and CPU usage.
    ///
    /// The first call establishes the CPU tick baseline and reports 0% CPU;
    /// calls less than 100 ms apart keep the prior baseline and also report 0.
    /// An unavailable source yields zeros rather than an error.
    pub fn snapshot_system(&mut self) -> SystemSnapshot {
        let meminfo = fs::read_to_string(self.root.join("meminfo")).unwrap_or_default();
        SystemSnapshot {
            mem_used_pct: memory_pct_from_meminfo(&meminfo),
            swap_used_pct: swap_pct_from_meminfo(&meminfo),
            cpu_used_pct: self.cpu_used_pct(),
        }
    }

    /// Enumerate the process table.
    ///
    /// Transient per-process read failures (the process exited mid-walk) skip
    /// that process; they are never fatal to the round. Sample memory for
    /// pids that are gone is evicted.
    pub fn snapshot_processes(&mut self) -> Vec<ProcessRecord> {
        let mut records = Vec::new();
        let now = Instant::now();

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(_) => return records,
        };

        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let pid: i32 = match file_name.to_string_lossy().parse() {
                Ok(pid) => pid,
                Err(_) => continue,
            };
            if let Some(record) = self.read_process(pid, now) {
                records.push(record);
            }
        }

        let live: HashSet<i32> = records.iter().map(|r| r.pid).collect();
        self.proc_samples.retain(|pid, _| live.contains(pid));

        records
    }

    fn read_process(&mut self, pid: i32, now: Instant) -> Option<ProcessRecord> {
        let proc_dir = self.root.join(pid.to_string());

        let stat_line = fs::read_to_string(proc_dir.join("stat")).ok()?;
        let stat = parse_stat_line(&stat_line)?;

        let status = fs::read_to_string(proc_dir.join("status")).unwrap_or_default();
        let memory_bytes = rss_bytes_from_status(&status);

        let ticks = stat.utime + stat.stime;
        let cpu_percent = self.sample_process_cpu(pid, ticks, now);

        // Read after the file walk; a pid gone by now is skipped entirely.
        let priority = read_priority(pid)?;

        Some(ProcessRecord {
            pid,
            is_system: is_system_process(pid, stat.state, &stat.name),
            is_foreground: stat.tty_nr > 0,
            is_suspended: stat.state == 'T',
            name: stat.name,
            priority,
            memory_bytes,
            cpu_percent,
            cpu_ticks_cumulative: ticks,
        })
    }

    /// Per-process CPU% from the delta against the stored sample, updating it.
    fn sample_process_cpu(&mut self, pid: i32, ticks: u64, now: Instant) -> f64 {
        let pct = match self.proc_samples.get(&pid) {
            Some(prev) => {
                let delta_secs = now.duration_since(prev.at).as_secs_f64();
                if delta_secs >= MIN_SAMPLE_SECS {
                    process_cpu_percent(
                        ticks.saturating_sub(prev.ticks),
                        delta_secs,
                        self.ticks_per_second,
                    )
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.proc_samples.insert(pid, ProcSample { ticks, at: now });
        pct
    }

    fn cpu_used_pct(&mut self) -> f64 {
        let stat = match fs::read_to_string(self.root.join("stat")) {
            Ok(stat) => stat,
            Err(_) => return 0.0,
        };
        let (total, idle) = match stat.lines().next().and_then(parse_cpu_totals) {
            Some(totals) => totals,
            None => return 0.0,
        };

        let now = Instant::now();
        match self.cpu_baseline {
            None => {
                self.cpu_baseline = Some(CpuBaseline { total, idle, at: now });
                0.0
            }
            Some(prev) => {
                if now.duration_since(prev.at).as_secs_f64() < MIN_SAMPLE_SECS {
                    return 0.0;
                }
                let delta_total = total.saturating_sub(prev.total);
                let delta_idle = idle.saturating_sub(prev.idle);
                self.cpu_baseline = Some(CpuBaseline { total, idle, at: now });
                if delta_total == 0 {
                    return 0.0;
                }
                let pct = 100.0 * (delta_total - delta_idle.min(delta_total)) as f64
                    / delta_total as f64;
                pct.clamp(0.0, 100.0)
            }
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Clock ticks per second as reported by the kernel, with a 100 Hz fallback.
pub fn ticks_per_second() -> f64 {
    // SAFETY: sysconf() has no preconditions.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 {
        ticks as f64
    } else {
        100.0
    }
}

/// Current nice value of a pid, or `None` if the process is gone.
///
/// getpriority(2) can legitimately return -1, so errno has to be cleared
/// first and checked afterwards.
fn read_priority(pid: i32) -> Option<i32> {
    // SAFETY: errno access and getpriority() are both benign for any pid.
    unsafe {
        *libc::__errno_location() = 0;
        let priority = libc::getpriority(libc::PRIO_PROCESS as _, pid as libc::id_t);
        if *libc::__errno_location() == libc::ESRCH {
            None
        } else {
            Some(priority)
        }
    }
}

/// Infrastructure classification: low pid, sleeping kernel worker, or an
/// init-family name.
fn is_system_process(pid: i32, state: char, name: &str) -> bool {
    if pid < SYSTEM_PID_CUTOFF {
        return true;
    }
    if state == 'S' && name.contains(KERNEL_WORKER_PATTERN) {
        return true;
    }
    SYSTEM_NAME_PATTERNS.iter().any(|p| name.contains(p))
}

/// CPU share of one logical core over the sampled interval, capped at 100.
fn process_cpu_percent(delta_ticks: u64, delta_secs: f64, ticks_per_second: f64) -> f64 {
    if delta_secs <= 0.0 || ticks_per_second <= 0.0 {
        return 0.0;
    }
    let pct = delta_ticks as f64 * 100.0 / (ticks_per_second * delta_secs);
    pct.min(100.0)
}

/// Parse one stat line.
///
/// The command name sits between the first `(` and the last `)`; the name may
/// itself contain parentheses, so only the outermost pair is trusted. The
/// fields following the name are state, ppid, pgrp, session, tty_nr, tpgid,
/// flags, the four fault counters, utime and stime.
fn parse_stat_line(line: &str) -> Option<StatFields> {
    let start = line.find('(')?;
    let end = line.rfind(')')?;
    if end <= start {
        return None;
    }
    let name = line[start + 1..end].to_string();
    if name.is_empty() {
        return None;
    }

    let fields: Vec<&str> = line[end + 1..].split_whitespace().collect();
    if fields.len() < 13 {
        return None;
    }

    Some(StatFields {
        name,
        state: fields[0].chars().next()?,
        tty_nr: fields[4].parse().ok()?,
        utime: fields[11].parse().ok()?,
        stime: fields[12].parse().ok()?,
    })
}

/// Resident set size in bytes from a status record (VmRSS is reported in KiB).
fn rss_bytes_from_status(status: &str) -> u64 {
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kib: u64 = rest
                .split_whitespace()
                .next()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            return kib * 1024;
        }
    }
    0
}

fn meminfo_field(content: &str, key: &str) -> i64 {
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        if parts.next() == Some(key) {
            return parts.next().and_then(|v| v.parse().ok()).unwrap_or(0);
        }
    }
    0
}

/// Used-memory percentage matching what `free` reports:
/// used = total - free - buffers - cached - slab, floored at zero.
fn memory_pct_from_meminfo(content: &str) -> f64 {
    let total = meminfo_field(content, "MemTotal:");
    if total == 0 {
        return 0.0;
    }
    let free = meminfo_field(content, "MemFree:");
    let buffers = meminfo_field(content, "Buffers:");
    let cached = meminfo_field(content, "Cached:");
    let slab = meminfo_field(content, "Slab:");

    let used = (total - free - buffers - cached - slab).max(0);
    used as f64 * 100.0 / total as f64
}

fn swap_pct_from_meminfo(content: &str) -> f64 {
    let total = meminfo_field(content, "SwapTotal:");
    if total == 0 {
        return 0.0;
    }
    let free = meminfo_field(content, "SwapFree:");
    (total - free).max(0) as f64 * 100.0 / total as f64
}

/// Aggregate (total, idle) tick counters from the first `/proc/stat` line.
fn parse_cpu_totals(line: &str) -> Option<(u64, u64)> {
    let mut parts = line.split_whitespace();
    if parts.next() != Some("cpu") {
        return None;
    }
    let values: Vec<u64> = parts.filter_map(|v| v.parse().ok()).collect();
    if values.len() < 8 {
        return None;
    }
    // user nice system idle iowait irq softirq steal
    let total: u64 = values[..8].iter().sum();
    Some((total, values[3]))
}
