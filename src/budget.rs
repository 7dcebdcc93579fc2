// SPDX-License-Identifier: GPL-2.0
// Operation budget - global completed-operations counter with a limit.

use std::num::NonZeroU64;
use std::sync::{Mutex, MutexGuard};

/// Counts critical sections completed across every worker and reports
/// when the configured budget is spent.
///
/// With a limit of `B`, exactly `B` completions are recorded; the next
/// completion observes the spent budget instead of being counted.
pub struct OpBudget {
    limit: Option<NonZeroU64>,
    completed: Mutex<u64>,
}

/// Proof that the budget was found spent. Holds the counter lock, so at
/// most one worker can act on exhaustion at a time; the holder is
/// expected to report and terminate the process.
pub struct Exhausted<'a> {
    completed: MutexGuard<'a, u64>,
}

impl Exhausted<'_> {
    /// Operations completed, equal to the configured budget.
    pub fn count(&self) -> u64 {
        *self.completed
    }
}

impl OpBudget {
    /// An `operations` of 0 means unlimited.
    pub fn new(operations: u64) -> Self {
        Self {
            limit: NonZeroU64::new(operations),
            completed: Mutex::new(0),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.limit.is_none()
    }

    /// Records one completed critical section. Unlimited budgets return
    /// immediately without taking the counter lock.
    pub fn complete_one(&self) -> Option<Exhausted<'_>> {
        let limit = self.limit?;
        let mut completed = self.completed.lock().unwrap();
        if *completed >= limit.get() {
            return Some(Exhausted { completed });
        }
        *completed += 1;
        None
    }
}
