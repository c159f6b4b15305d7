//! Process actuation: priority changes and stop/continue/terminate signals.
//!
//! The actuator is a pure adapter over setpriority(2) and kill(2). It performs
//! no retries and no logging; every failure is reported through
//! [`ActuationError`] so callers can pattern-match on what happened instead of
//! relying on unwinding.

use std::fmt;
use std::io;

/// Lowest (most-favored) nice value accepted by the kernel.
pub const PRIORITY_MIN: i32 = -20;

/// Highest (least-favored) nice value accepted by the kernel.
pub const PRIORITY_MAX: i32 = 19;

/// Typed outcome of a failed actuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActuationError {
    /// Target process does not exist.
    NotFound(i32),
    /// Insufficient privileges for the requested action.
    NotPermitted(String),
    /// The target is protected from this action (init, pid 1).
    Protected(i32),
    /// Any other OS-level failure.
    Other(String),
}

impl fmt::Display for ActuationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuationError::NotFound(pid) => write!(f, "process {} not found", pid),
            ActuationError::NotPermitted(msg) => write!(f, "permission denied: {}", msg),
            ActuationError::Protected(pid) => {
                write!(f, "process {} is protected and cannot be signalled", pid)
            }
            ActuationError::Other(msg) => write!(f, "actuation failed: {}", msg),
        }
    }
}

impl std::error::Error for ActuationError {}

/// Side effects the governor may issue against a pid.
///
/// The scheduling engine and memory optimizer walk the process table through
/// this trait, which keeps the control logic independent of the live kernel.
pub trait Actuate: Send + Sync {
    /// Set the scheduling priority (nice value) of a process.
    ///
    /// The value is clamped to [`PRIORITY_MIN`]..=[`PRIORITY_MAX`] before it
    /// is applied. A vanished process is a no-op, not an error; the next
    /// snapshot simply no longer contains it.
    fn set_priority(&self, pid: i32, priority: i32) -> Result<(), ActuationError>;

    /// Stop a process (SIGSTOP).
    fn suspend(&self, pid: i32) -> Result<(), ActuationError>;

    /// Continue a stopped process (SIGCONT).
    fn resume(&self, pid: i32) -> Result<(), ActuationError>;

    /// Terminate a process (SIGTERM). Refused for pid 1.
    fn terminate(&self, pid: i32) -> Result<(), ActuationError>;
}

/// Clamp a requested priority into the valid nice range.
pub fn clamp_priority(priority: i32) -> i32 {
    priority.clamp(PRIORITY_MIN, PRIORITY_MAX)
}

/// Live-kernel actuator backed by libc.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysActuator;

impl SysActuator {
    pub fn new() -> Self {
        Self
    }

    fn send_signal(pid: i32, signal: i32, action: &str) -> Result<(), ActuationError> {
        // SAFETY: kill() accepts any pid/signal pair and reports failure
        // through errno.
        let rc = unsafe { libc::kill(pid, signal) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::ESRCH) => Err(ActuationError::NotFound(pid)),
            Some(libc::EPERM) => Err(ActuationError::NotPermitted(format!(
                "cannot {} PID {} (need root privileges)",
                action, pid
            ))),
            _ => Err(ActuationError::Other(format!(
                "failed to {} PID {}: {}",
                action, pid, err
            ))),
        }
    }
}

impl Actuate for SysActuator {
    fn set_priority(&self, pid: i32, priority: i32) -> Result<(), ActuationError> {
        let priority = clamp_priority(priority);
        // SAFETY: setpriority() validates its arguments and reports failure
        // through errno.
        let rc =
            unsafe { libc::setpriority(libc::PRIO_PROCESS as _, pid as libc::id_t, priority) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            // The process exited between snapshot and actuation; nothing to do.
            Some(libc::ESRCH) => Ok(()),
            Some(libc::EPERM) | Some(libc::EACCES) => Err(ActuationError::NotPermitted(format!(
                "cannot set priority {} for PID {} (need root privileges)",
                priority, pid
            ))),
            _ => Err(ActuationError::Other(format!(
                "failed to set priority for PID {}: {}",
                pid, err
            ))),
        }
    }

    fn suspend(&self, pid: i32) -> Result<(), ActuationError> {
        Self::send_signal(pid, libc::SIGSTOP, "suspend")
    }

    fn resume(&self, pid: i32) -> Result<(), ActuationError> {
        Self::send_signal(pid, libc::SIGCONT, "resume")
    }

    fn terminate(&self, pid: i32) -> Result<(), ActuationError> {
        if pid == 1 {
            return Err(ActuationError::Protected(pid));
        }
        Self::send_signal(pid, libc::SIGTERM, "terminate")
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Recording actuator for exercising the control logic without touching
    //! real processes.

    use super::{Actuate, ActuationError};
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        SetPriority(i32, i32),
        Suspend(i32),
        Resume(i32),
        Terminate(i32),
    }

    /// Records every actuation; pids listed in `failing` report `NotFound`.
    #[derive(Debug, Default)]
    pub struct RecordingActuator {
        calls: Mutex<Vec<Call>>,
        failing: Mutex<HashSet<i32>>,
    }

    impl RecordingActuator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_pid(&self, pid: i32) {
            self.failing.lock().unwrap().insert(pid);
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn clear(&self) {
            self.calls.lock().unwrap().clear();
        }

        fn record(&self, pid: i32, call: Call) -> Result<(), ActuationError> {
            self.calls.lock().unwrap().push(call);
            if self.failing.lock().unwrap().contains(&pid) {
                Err(ActuationError::NotFound(pid))
            } else {
                Ok(())
            }
        }
    }

    impl Actuate for RecordingActuator {
        fn set_priority(&self, pid: i32, priority: i32) -> Result<(), ActuationError> {
            self.record(pid, Call::SetPriority(pid, priority))
        }

        fn suspend(&self, pid: i32) -> Result<(), ActuationError> {
            self.record(pid, Call::Suspend(pid))
        }

        fn resume(&self, pid: i32) -> Result<(), ActuationError> {
            self.record(pid, Call::Resume(pid))
        }

        fn terminate(&self, pid: i32) -> Result<(), ActuationError> {
            self.record(pid, Call::Terminate(pid))
        }
    }
}
