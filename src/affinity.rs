//! Thread-to-core pinning and CPU discovery.
//!
//! Each worker pins itself to one logical core before arriving at the start
//! rendezvous, so the OS scheduler cannot migrate it mid-measurement.
//!
//! # Platform Support
//!
//! - **Linux**: `pthread_setaffinity_np` / `sched_getaffinity`
//! - **Other**: pinning and introspection return `ErrorKind::Unsupported`;
//!   the caller decides whether that is fatal.
//!
//! # Containers
//!
//! Under cgroups/cpusets the process may only run on a subset of host CPUs.
//! Pinning a worker to core `i` fails with `EINVAL` when `i` is outside that
//! subset. [`allowed_cpus`] reports the subset for callers that want to map
//! workers onto it instead of onto `0..N`.

use std::io;

/// Number of CPU indices a `cpu_set_t` can address.
#[cfg(target_os = "linux")]
pub const CPU_SET_CAPACITY: usize = std::mem::size_of::<libc::cpu_set_t>() * 8;

#[cfg(not(target_os = "linux"))]
pub const CPU_SET_CAPACITY: usize = 1024;

#[inline]
fn validate_core(core: usize) -> io::Result<()> {
    if core >= CPU_SET_CAPACITY {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("core index {core} exceeds CPU_SET_CAPACITY ({CPU_SET_CAPACITY})"),
        ));
    }
    Ok(())
}

/// Pins the calling thread to exactly `{core}`.
///
/// # Errors
///
/// - `InvalidInput` if `core >= CPU_SET_CAPACITY`
/// - the raw OS error from `pthread_setaffinity_np` (e.g. `EINVAL` when the
///   core is outside the allowed set)
/// - `Unsupported` on non-Linux targets
#[cfg(target_os = "linux")]
pub fn pin_current_thread_to_core(core: usize) -> io::Result<()> {
    let mut set = CpuSet::new();
    set.set(core)?;
    set.apply()
}

#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread_to_core(core: usize) -> io::Result<()> {
    validate_core(core)?;
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "CPU affinity is not supported on this platform",
    ))
}

/// CPUs the calling thread may run on.
///
/// Called from a pinned worker this is exactly the worker's pin set.
#[cfg(target_os = "linux")]
pub fn allowed_cpus() -> io::Result<CpuSet> {
    let mut set = CpuSet::new();
    // SAFETY: pid 0 selects the calling thread; `set.inner` is a valid,
    // writable cpu_set_t of the size we pass.
    let rc = unsafe {
        libc::sched_getaffinity(
            0,
            std::mem::size_of::<libc::cpu_set_t>(),
            &mut set.inner as *mut _,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(set)
}

#[cfg(not(target_os = "linux"))]
pub fn allowed_cpus() -> io::Result<CpuSet> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "allowed_cpus() is not supported on this platform",
    ))
}

/// Hardware concurrency available to this process.
///
/// Falls back to 1 (with a warning) if it cannot be determined.
pub fn num_cpus() -> usize {
    match std::thread::available_parallelism() {
        Ok(n) => n.get(),
        Err(e) => {
            eprintln!("WARN: Could not determine CPU count ({e}), defaulting to 1");
            1
        }
    }
}

/// CPU affinity mask.
#[derive(Clone, Debug)]
pub struct CpuSet {
    #[cfg(target_os = "linux")]
    inner: libc::cpu_set_t,

    #[cfg(not(target_os = "linux"))]
    _private: (),
}

impl CpuSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        #[cfg(target_os = "linux")]
        {
            // SAFETY: an all-zero cpu_set_t is a valid empty set.
            let mut inner: libc::cpu_set_t = unsafe { std::mem::zeroed() };
            unsafe { libc::CPU_ZERO(&mut inner) };
            Self { inner }
        }
        #[cfg(not(target_os = "linux"))]
        {
            Self { _private: () }
        }
    }

    /// Adds `core` to the set.
    #[cfg(target_os = "linux")]
    pub fn set(&mut self, core: usize) -> io::Result<()> {
        validate_core(core)?;
        // SAFETY: bounds checked above.
        unsafe { libc::CPU_SET(core, &mut self.inner) };
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    pub fn set(&mut self, core: usize) -> io::Result<()> {
        validate_core(core)
    }

    /// Whether `core` is in the set. Out-of-range indices are never set.
    #[cfg(target_os = "linux")]
    pub fn is_set(&self, core: usize) -> bool {
        if core >= CPU_SET_CAPACITY {
            return false;
        }
        // SAFETY: bounds checked above.
        unsafe { libc::CPU_ISSET(core, &self.inner) }
    }

    #[cfg(not(target_os = "linux"))]
    pub fn is_set(&self, _core: usize) -> bool {
        false
    }

    #[cfg(target_os = "linux")]
    pub fn count(&self) -> usize {
        // SAFETY: `inner` is always a valid cpu_set_t.
        unsafe { libc::CPU_COUNT(&self.inner) as usize }
    }

    #[cfg(not(target_os = "linux"))]
    pub fn count(&self) -> usize {
        0
    }

    /// Applies this set to the calling thread.
    #[cfg(target_os = "linux")]
    pub fn apply(&self) -> io::Result<()> {
        // SAFETY: `inner` is a valid cpu_set_t; pthread_setaffinity_np
        // returns its error code directly rather than through errno.
        let rc = unsafe {
            libc::pthread_setaffinity_np(
                libc::pthread_self(),
                std::mem::size_of::<libc::cpu_set_t>(),
                &self.inner as *const _,
            )
        };
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    pub fn apply(&self) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "CPU affinity is not supported on this platform",
        ))
    }

    /// Set core indices in ascending order.
    ///
    /// Scans the full `CPU_SET_CAPACITY` bitmask.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..CPU_SET_CAPACITY).filter(move |&core| self.is_set(core))
    }
}

impl Default for CpuSet {
    fn default() -> Self {
        Self::new()
    }
}
