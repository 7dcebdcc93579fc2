// SPDX-License-Identifier: GPL-2.0
// Contention arena - one mutex per worker group.

use std::sync::{Mutex, MutexGuard};

/// The locks workers contend on. Group `g` serializes every worker
/// whose index maps to `g`, for the lifetime of the process. No
/// fairness among waiters is promised.
pub struct LockGroups {
    groups: Vec<Mutex<()>>,
}

impl LockGroups {
    /// Allocates every group up front, before any worker exists.
    pub fn new(count: usize) -> Self {
        Self {
            groups: (0..count).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Blocks until `group` is free. The group stays held until the
    /// returned guard drops. Group indices come from the validated
    /// configuration, so an out-of-range index is a caller bug.
    pub fn lock(&self, group: usize) -> MutexGuard<'_, ()> {
        self.groups[group].lock().unwrap()
    }
}
