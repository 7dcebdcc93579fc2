// SPDX-License-Identifier: GPL-2.0
// Workload configuration - CLI options, validation, group arithmetic.

use anyhow::{bail, Result};
use clap::Parser;
use static_assertions::const_assert;

use crate::affinity::PinPolicy;
use crate::topology;

/// Upper bound on the number of lock groups; the group count must stay
/// strictly below it.
pub const MAX_LOCK_GROUPS: usize = 20000;

const DEFAULT_THREADS: usize = 20000;
const DEFAULT_THREADS_PER_GROUP: usize = 20;
const DEFAULT_LOOP_COUNT: u64 = 1000;
const DEFAULT_SLEEP_US: u64 = 1000;

const_assert!(DEFAULT_THREADS.div_ceil(DEFAULT_THREADS_PER_GROUP) < MAX_LOCK_GROUPS);

/// threadload: a synthetic scheduler and lock-contention load generator.
///
/// Spawns --threads worker threads partitioned into lock groups of
/// --threads-per-group, one shared mutex per group. Each worker loops
/// forever: take the group lock, run --loop-count iterations of
/// CPU-bound work, drop the lock, sleep --sleep-us microseconds.
///
/// With --operations N the process exits 0 once N critical sections
/// have completed across all workers. With --pin-first-cpu C workers
/// are pinned round-robin onto the online CPUs starting at core C.
/// Termination is the budget exit or an external kill; there is no
/// graceful shutdown path.
#[derive(Debug, Parser)]
pub struct Opts {
    /// Total number of worker threads.
    #[clap(short = 'm', long, default_value_t = DEFAULT_THREADS)]
    pub threads: usize,

    /// Number of threads sharing one lock group.
    #[clap(short = 't', long, default_value_t = DEFAULT_THREADS_PER_GROUP)]
    pub threads_per_group: usize,

    /// CPU-bound loop iterations per critical section.
    #[clap(short = 'l', long, default_value_t = DEFAULT_LOOP_COUNT)]
    pub loop_count: u64,

    /// Sleep between cycles, in microseconds.
    #[clap(short = 'd', long, default_value_t = DEFAULT_SLEEP_US)]
    pub sleep_us: u64,

    /// Total operations to perform before exiting (0 = unlimited).
    #[clap(short = 'o', long, default_value_t = 0)]
    pub operations: u64,

    /// Pin workers to CPUs starting at this core (-1 = disabled).
    #[clap(short = 'p', long, allow_hyphen_values = true, default_value_t = -1)]
    pub pin_first_cpu: i64,

    /// Enable verbose output. Specify multiple times to increase verbosity.
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Validated, immutable workload parameters, built once before any
/// worker starts.
#[derive(Debug, Clone)]
pub struct Config {
    pub threads: usize,
    pub threads_per_group: usize,
    pub loop_count: u64,
    pub sleep_us: u64,
    pub operations: u64,
    pub pinning: Option<PinPolicy>,
}

impl Config {
    /// Checks every startup precondition. Nothing is allocated or
    /// spawned until this returns Ok.
    pub fn from_opts(opts: &Opts) -> Result<Self> {
        if opts.threads_per_group == 0 {
            bail!("threads-per-group must be at least 1");
        }

        let pinning = match usize::try_from(opts.pin_first_cpu) {
            Ok(first_cpu) => Some(PinPolicy::new(first_cpu, topology::online_cpu_count()?)?),
            Err(_) => None,
        };

        let cfg = Self {
            threads: opts.threads,
            threads_per_group: opts.threads_per_group,
            loop_count: opts.loop_count,
            sleep_us: opts.sleep_us,
            operations: opts.operations,
            pinning,
        };
        if cfg.group_count() >= MAX_LOCK_GROUPS {
            bail!(
                "{} threads at {} per group need {} lock groups (limit {})",
                cfg.threads,
                cfg.threads_per_group,
                cfg.group_count(),
                MAX_LOCK_GROUPS
            );
        }
        Ok(cfg)
    }

    /// Lock groups needed to cover every worker. Ceiling division keeps
    /// the last, possibly partial, group addressable.
    pub fn group_count(&self) -> usize {
        self.threads.div_ceil(self.threads_per_group)
    }

    /// Lock group contended by the worker at `index`.
    pub fn group_of(&self, index: usize) -> usize {
        index / self.threads_per_group
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config> {
        let mut argv = vec!["threadload"];
        argv.extend_from_slice(args);
        Config::from_opts(&Opts::parse_from(argv))
    }

    #[test]
    fn defaults_match_the_documented_knobs() {
        let cfg = parse(&[]).unwrap();
        assert_eq!(cfg.threads, 20000);
        assert_eq!(cfg.threads_per_group, 20);
        assert_eq!(cfg.loop_count, 1000);
        assert_eq!(cfg.sleep_us, 1000);
        assert_eq!(cfg.operations, 0);
        assert!(cfg.pinning.is_none());
        assert_eq!(cfg.group_count(), 1000);
    }

    #[test]
    fn group_count_for_exactly_divisible_populations() {
        assert_eq!(parse(&["-m", "40", "-t", "20"]).unwrap().group_count(), 2);
        assert_eq!(parse(&["-m", "100", "-t", "25"]).unwrap().group_count(), 4);
    }

    #[test]
    fn partial_last_group_is_still_allocated() {
        let cfg = parse(&["-m", "41", "-t", "20"]).unwrap();
        assert_eq!(cfg.group_count(), 3);
        assert_eq!(cfg.group_of(40), 2);
        assert!(cfg.group_of(40) < cfg.group_count());
    }

    #[test]
    fn workers_map_to_groups_in_blocks() {
        let cfg = parse(&["-m", "40", "-t", "20"]).unwrap();
        assert_eq!(cfg.group_of(0), 0);
        assert_eq!(cfg.group_of(19), 0);
        assert_eq!(cfg.group_of(20), 1);
        assert_eq!(cfg.group_of(39), 1);
    }

    #[test]
    fn group_capacity_is_a_strict_bound() {
        assert!(parse(&["-m", "19999", "-t", "1"]).is_ok());
        assert!(parse(&["-m", "20000", "-t", "1"]).is_err());
    }

    #[test]
    fn zero_threads_per_group_is_rejected() {
        assert!(parse(&["-t", "0"]).is_err());
    }

    #[test]
    fn zero_threads_is_a_valid_degenerate_run() {
        let cfg = parse(&["-m", "0"]).unwrap();
        assert_eq!(cfg.threads, 0);
        assert_eq!(cfg.group_count(), 0);
    }

    #[test]
    fn pinning_is_disabled_by_default_and_for_any_negative() {
        assert!(parse(&[]).unwrap().pinning.is_none());
        assert!(parse(&["-p", "-1"]).unwrap().pinning.is_none());
        assert!(parse(&["-p", "-5"]).unwrap().pinning.is_none());
    }

    #[test]
    fn pinning_from_core_zero_is_accepted_on_any_host() {
        let cfg = parse(&["-p", "0"]).unwrap();
        let policy = cfg.pinning.expect("pinning enabled");
        assert_eq!(policy.first_cpu(), 0);
        assert!(policy.online_cpus() >= 1);
    }

    #[test]
    fn pin_start_past_the_online_range_is_rejected() {
        assert!(parse(&["-p", "1000000"]).is_err());
    }
}
