// SPDX-License-Identifier: GPL-2.0
// Worker threads - the acquire/work/release/sleep cycle.

use std::process;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};

use crate::affinity;
use crate::budget::OpBudget;
use crate::config::Config;
use crate::lock_groups::LockGroups;

/// State shared by every worker for the process lifetime.
pub struct Shared {
    pub cfg: Config,
    pub groups: LockGroups,
    pub budget: OpBudget,
}

/// One spawned worker thread.
pub struct Worker {
    index: usize,
    handle: JoinHandle<()>,
}

impl Worker {
    /// Spawns worker `index`. A spawn refusal is fatal to the whole run.
    pub fn spawn(index: usize, shared: Arc<Shared>) -> Result<Self> {
        let handle = thread::Builder::new()
            .name(format!("worker/{}", index))
            .spawn(move || worker_loop(index, &shared))
            .with_context(|| format!("failed to spawn worker {}", index))?;
        Ok(Self { index, handle })
    }

    /// Blocks until the worker exits. The loop never returns, so this
    /// only comes back if the worker panicked; budget exhaustion ends
    /// the process before any join completes.
    pub fn join(self) -> Result<()> {
        self.handle
            .join()
            .map_err(|_| anyhow!("worker {} terminated abnormally", self.index))
    }
}

fn worker_loop(index: usize, shared: &Shared) {
    let group = shared.cfg.group_of(index);

    if let Some(policy) = &shared.cfg.pinning {
        let core = policy.core_for(index);
        match affinity::pin_current_thread(core) {
            Ok(()) => info!("worker {} pinned to cpu {}", index, core),
            Err(err) => warn!("could not set CPU affinity for worker {}: {}", index, err),
        }
    }

    loop {
        {
            let _guard = shared.groups.lock(group);
            cpu_spin(shared.cfg.loop_count);
        }

        if let Some(done) = shared.budget.complete_one() {
            // Exit while the exhaustion token pins the counter, so no
            // other worker can race past the budget or report twice.
            println!("operation finished - {}", done.count());
            process::exit(0);
        }

        thread::sleep(Duration::from_micros(shared.cfg.sleep_us));
    }
}

/// The bounded critical-section work: `iterations` additions, each
/// routed through `black_box` so the loop survives optimization.
pub fn cpu_spin(iterations: u64) -> u64 {
    let mut acc: u64 = 0;
    for i in 0..iterations {
        acc = std::hint::black_box(acc.wrapping_add(i));
    }
    acc
}
