// SPDX-License-Identifier: GPL-2.0

//! Synthetic scheduler and lock-contention load generator.
//!
//! Workers are partitioned into lock groups, one mutex per group, and
//! cycle through acquire, bounded CPU work, release, budget check,
//! sleep. The binary in `main.rs` parses the knobs and calls [`run`].

pub mod affinity;
pub mod budget;
pub mod config;
pub mod lock_groups;
pub mod topology;
pub mod worker;

use std::sync::Arc;

use anyhow::Result;
use log::info;

use budget::OpBudget;
use config::Config;
use lock_groups::LockGroups;
use worker::{Shared, Worker};

/// Runs the workload described by `cfg`: allocate the lock groups,
/// spawn every worker, then wait. On the normal path this never
/// returns; budget exhaustion terminates the process from inside a
/// worker, and an unlimited run ends only by external kill.
pub fn run(cfg: Config) -> Result<()> {
    info!(
        "spawning {} workers over {} lock groups ({} per group)",
        cfg.threads,
        cfg.group_count(),
        cfg.threads_per_group
    );
    info!(
        "critical section {} iterations, idle sleep {} us",
        cfg.loop_count, cfg.sleep_us
    );
    match cfg.operations {
        0 => info!("operation budget: unlimited"),
        n => info!("operation budget: {}", n),
    }
    if let Some(policy) = &cfg.pinning {
        info!(
            "pinning workers round-robin from cpu {} over {} online cpus",
            policy.first_cpu(),
            policy.online_cpus()
        );
    }

    let shared = Arc::new(Shared {
        groups: LockGroups::new(cfg.group_count()),
        budget: OpBudget::new(cfg.operations),
        cfg,
    });

    let mut workers = Vec::with_capacity(shared.cfg.threads);
    for index in 0..shared.cfg.threads {
        workers.push(Worker::spawn(index, Arc::clone(&shared))?);
    }

    for worker in workers {
        worker.join()?;
    }
    Ok(())
}
