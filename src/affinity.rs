// SPDX-License-Identifier: GPL-2.0
// CPU pinning - worker-index to core mapping and thread affinity.

use std::io;

use anyhow::{bail, Result};

/// Highest core index representable in a `libc::cpu_set_t`, computed
/// from the struct size because `CPU_SETSIZE` is not a Rust const.
#[cfg(target_os = "linux")]
pub const CPU_SET_CAPACITY: usize = std::mem::size_of::<libc::cpu_set_t>() * 8;

#[cfg(not(target_os = "linux"))]
pub const CPU_SET_CAPACITY: usize = 1024;

/// Round-robin placement of workers onto the online CPUs at and above
/// `first_cpu`. Constructing one establishes `first_cpu < online_cpus`,
/// so the modulus in `core_for` is never zero.
#[derive(Debug, Clone, Copy)]
pub struct PinPolicy {
    first_cpu: usize,
    online_cpus: usize,
}

impl PinPolicy {
    pub fn new(first_cpu: usize, online_cpus: usize) -> Result<Self> {
        if first_cpu >= online_cpus {
            bail!(
                "first pinned CPU ({}) must be below the online CPU count ({})",
                first_cpu,
                online_cpus
            );
        }
        Ok(Self {
            first_cpu,
            online_cpus,
        })
    }

    pub fn first_cpu(&self) -> usize {
        self.first_cpu
    }

    pub fn online_cpus(&self) -> usize {
        self.online_cpus
    }

    /// Core for the worker at `index`, always in
    /// `[first_cpu, online_cpus)`.
    pub fn core_for(&self, index: usize) -> usize {
        self.first_cpu + index % (self.online_cpus - self.first_cpu)
    }
}

/// Pins the calling thread to `core`. Refusal is reported, not fatal;
/// the caller decides whether to continue unpinned.
#[cfg(target_os = "linux")]
pub fn pin_current_thread(core: usize) -> io::Result<()> {
    if core >= CPU_SET_CAPACITY {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("core {} exceeds cpu_set_t capacity {}", core, CPU_SET_CAPACITY),
        ));
    }

    // SAFETY: a zeroed cpu_set_t is a valid empty set and core is below
    // CPU_SET_CAPACITY, so CPU_SET stays in bounds. pthread_setaffinity_np
    // returns its error code directly rather than through errno.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(core, &mut set);

        let rc = libc::pthread_setaffinity_np(
            libc::pthread_self(),
            std::mem::size_of::<libc::cpu_set_t>(),
            &set,
        );
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread(_core: usize) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "thread affinity is not supported on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_cycle_wraps_over_the_online_range() {
        let policy = PinPolicy::new(2, 8).unwrap();
        let cores: Vec<usize> = (0..10).map(|i| policy.core_for(i)).collect();
        assert_eq!(cores, vec![2, 3, 4, 5, 6, 7, 2, 3, 4, 5]);
    }

    #[test]
    fn single_core_range_maps_every_worker_to_first() {
        let policy = PinPolicy::new(3, 4).unwrap();
        for index in 0..32 {
            assert_eq!(policy.core_for(index), 3);
        }
    }

    #[test]
    fn cores_stay_between_first_and_online() {
        let policy = PinPolicy::new(1, 5).unwrap();
        for index in 0..100 {
            let core = policy.core_for(index);
            assert!(core >= 1 && core < 5, "index {} mapped to core {}", index, core);
        }
    }

    #[test]
    fn first_cpu_at_or_past_online_count_is_rejected() {
        assert!(PinPolicy::new(8, 8).is_err());
        assert!(PinPolicy::new(9, 8).is_err());
        assert!(PinPolicy::new(0, 0).is_err());
    }

    #[cfg(target_os = "linux")]
    fn first_allowed_core() -> Option<usize> {
        unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            if libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mut set) != 0 {
                return None;
            }
            (0..CPU_SET_CAPACITY).find(|&core| libc::CPU_ISSET(core, &set))
        }
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn pin_to_an_allowed_core_succeeds() {
        let core = first_allowed_core().expect("process must be allowed on some core");
        pin_current_thread(core).unwrap();
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn pin_past_cpu_set_capacity_fails_safely() {
        assert!(pin_current_thread(CPU_SET_CAPACITY).is_err());
        assert!(pin_current_thread(usize::MAX).is_err());
    }

    #[test]
    #[cfg(not(target_os = "linux"))]
    fn pin_is_unsupported_off_linux() {
        let err = pin_current_thread(0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }
}
