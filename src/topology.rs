// SPDX-License-Identifier: GPL-2.0
// Topology probe - online CPU count.

use anyhow::{bail, Result};

/// Number of CPUs currently online. A non-positive answer from the
/// kernel is a fatal environment error.
pub fn online_cpu_count() -> Result<usize> {
    let nr = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if nr <= 0 {
        bail!("sysconf(_SC_NPROCESSORS_ONLN) returned {}", nr);
    }
    Ok(nr as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn online_count_is_positive() {
        assert!(online_cpu_count().unwrap() >= 1);
    }
}
