//! OS-facing adapters: the read-only probe and the actuation layer.

pub mod actuator;
pub mod probe;

pub use actuator::{clamp_priority, Actuate, ActuationError, SysActuator, PRIORITY_MAX, PRIORITY_MIN};
pub use probe::{ticks_per_second, ProcessRecord, SystemProbe, SystemSnapshot};

/// Whether the current process runs with root privileges.
///
/// Lowering a nice value below its current setting and signalling other
/// users' processes both require elevation; without it actuations surface
/// `NotPermitted` and the governor degrades gracefully.
pub fn is_elevated() -> bool {
    // SAFETY: geteuid() has no preconditions.
    unsafe { libc::geteuid() == 0 }
}
