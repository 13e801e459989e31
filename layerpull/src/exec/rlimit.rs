//! Resource limit handling for bounded child processes.
//!
//! Only the async-signal-safe `apply_limits_raw()` runs in the child,
//! called from the `pre_exec` hook before exec().

use super::ProcessLimits;
use std::io;

/// Resource type alias for cross-platform compatibility.
/// On Linux glibc, RLIMIT_* are u32; on macOS they're i32.
#[cfg(all(target_os = "linux", target_env = "gnu"))]
type RlimitResource = libc::__rlimit_resource_t;
#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
type RlimitResource = libc::c_int;

/// Get current (soft, hard) value of a resource limit.
#[allow(clippy::unnecessary_cast)]
pub fn get_rlimit(resource: RlimitResource) -> Result<(u64, u64), io::Error> {
    let mut rlim = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };

    let result = unsafe { libc::getrlimit(resource, &mut rlim) };

    if result != 0 {
        return Err(io::Error::last_os_error());
    }

    Ok((rlim.rlim_cur as u64, rlim.rlim_max as u64))
}

/// Apply address-space and CPU-time limits - async-signal-safe version for pre_exec.
///
/// The CPU hard limit sits one second above the soft limit, so an overrun
/// is delivered as SIGXCPU and a bare SIGKILL keeps meaning "killed from
/// outside".
///
/// # Safety
///
/// Runs after `fork()` and before `exec()`. Only getrlimit/setrlimit are
/// called. Do NOT add logging, allocation or locking here.
///
/// # Returns
/// * `Ok(())` - Limits applied successfully
/// * `Err(errno)` - Failed to set a limit (returns raw errno)
pub fn apply_limits_raw(limits: &ProcessLimits) -> Result<(), i32> {
    set_rlimit_raw(
        libc::RLIMIT_AS,
        limits.address_space_bytes,
        limits.address_space_bytes,
    )?;
    set_rlimit_raw(
        libc::RLIMIT_CPU,
        limits.cpu_time_secs,
        limits.cpu_time_secs.saturating_add(1),
    )?;
    Ok(())
}

/// Set soft and hard limits, both clamped to the inherited hard limit so an
/// unprivileged parent never trips EPERM.
#[inline]
#[allow(clippy::unnecessary_cast)]
fn set_rlimit_raw(resource: RlimitResource, soft: u64, hard: u64) -> Result<(), i32> {
    let mut current = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    if unsafe { libc::getrlimit(resource, &mut current) } != 0 {
        return Err(get_errno());
    }

    let clamp = |value: u64| {
        let value = value as libc::rlim_t;
        if current.rlim_max != libc::RLIM_INFINITY && value > current.rlim_max {
            current.rlim_max
        } else {
            value
        }
    };

    let rlim = libc::rlimit {
        rlim_cur: clamp(soft),
        rlim_max: clamp(hard),
    };

    if unsafe { libc::setrlimit(resource, &rlim) } != 0 {
        return Err(get_errno());
    }

    Ok(())
}

/// Get errno in an async-signal-safe way.
#[inline]
fn get_errno() -> i32 {
    #[cfg(target_os = "macos")]
    unsafe {
        *libc::__error()
    }

    #[cfg(target_os = "linux")]
    unsafe {
        *libc::__errno_location()
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        libc::ENOSYS
    }
}
