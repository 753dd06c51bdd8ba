// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Multi-threaded random workload against a shared [`LockManager`].
//!
//! Every worker runs its transactions one after another: acquire each planned
//! lock in order, hold them briefly, then release in reverse. A transaction
//! refused by the deadlock detector releases what it holds and is retried
//! under a fresh id, the way a database aborts and restarts a victim.

mod plan;

pub use plan::{LockStep, PlanGenerator};

use crate::config::{LockingConfig, SimulationConfig};
use crate::error::Result;
use crate::locking::{
    CancellationToken, LockManager, LockWaitObserver, ObserverChain, ResourceKey, SlowWaitLogger,
    Transaction, WaitStatistics,
};
use log::{debug, warn};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Attempts per planned transaction before it is given up.
pub const MAX_ATTEMPTS: usize = 32;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub workers: usize,
    pub resources: usize,
    pub planned: u64,
    pub committed: u64,
    pub deadlock_aborts: u64,
    pub gave_up: u64,
    pub terminated: u64,
    pub locks_granted: u64,
    pub waits: u64,
    pub deadlocks_detected: u64,
    pub mean_wait_micros: u64,
    pub max_wait_micros: u64,
    pub elapsed_ms: u64,
    /// Resources still tracked after every worker finished. Always zero
    /// unless a lock leaked.
    pub leftover_resources: usize,
}

#[derive(Debug, Default)]
struct WorkerTally {
    planned: u64,
    committed: u64,
    deadlock_aborts: u64,
    gave_up: u64,
    terminated: u64,
    locks_granted: u64,
}

impl WorkerTally {
    fn merge(&mut self, other: WorkerTally) {
        self.planned += other.planned;
        self.committed += other.committed;
        self.deadlock_aborts += other.deadlock_aborts;
        self.gave_up += other.gave_up;
        self.terminated += other.terminated;
        self.locks_granted += other.locks_granted;
    }
}

enum Attempt {
    Committed,
    Terminated,
}

pub struct Simulation {
    config: SimulationConfig,
    locking: LockingConfig,
    cancel: CancellationToken,
}

impl Simulation {
    pub fn new(config: SimulationConfig, locking: LockingConfig) -> Self {
        Self {
            config,
            locking,
            cancel: CancellationToken::new(),
        }
    }

    /// Transactions are created as children of `token`, so cancelling it
    /// terminates every in-flight wait and stops the workers.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn run(&self) -> Result<SimulationReport> {
        let seed = self.config.seed.unwrap_or_else(rand::random);
        let statistics = Arc::new(WaitStatistics::new());
        let observers: Vec<Arc<dyn LockWaitObserver<ResourceKey, Transaction>>> = vec![
            statistics.clone(),
            Arc::new(SlowWaitLogger::new(Duration::from_millis(
                self.config.slow_wait_ms,
            ))),
        ];
        let manager: LockManager<ResourceKey, Transaction> =
            LockManager::with_config(&self.locking, Arc::new(ObserverChain::new(observers)));
        let next_id = AtomicU64::new(1);

        debug!(
            "Starting simulation: {} workers, {} resources, seed {seed}",
            self.config.workers, self.config.resources
        );
        let started = Instant::now();

        let mut tally = WorkerTally::default();
        thread::scope(|scope| -> Result<()> {
            let handles: Vec<_> = (0..self.config.workers)
                .map(|worker| {
                    let manager = &manager;
                    let next_id = &next_id;
                    let worker_seed = seed.wrapping_add(worker as u64);
                    scope.spawn(move || self.run_worker(manager, next_id, worker_seed))
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(result) => tally.merge(result?),
                    Err(payload) => std::panic::resume_unwind(payload),
                }
            }
            Ok(())
        })?;

        let waits = statistics.snapshot();
        Ok(SimulationReport {
            seed,
            workers: self.config.workers,
            resources: self.config.resources,
            planned: tally.planned,
            committed: tally.committed,
            deadlock_aborts: tally.deadlock_aborts,
            gave_up: tally.gave_up,
            terminated: tally.terminated,
            locks_granted: tally.locks_granted,
            waits: waits.waits,
            deadlocks_detected: manager.detected_deadlock_count(),
            mean_wait_micros: u64::try_from(waits.mean_wait().as_micros()).unwrap_or(u64::MAX),
            max_wait_micros: waits.max_wait_micros,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            leftover_resources: manager.resource_count(),
        })
    }

    fn run_worker(
        &self,
        manager: &LockManager<ResourceKey, Transaction>,
        next_id: &AtomicU64,
        seed: u64,
    ) -> Result<WorkerTally> {
        let mut generator = PlanGenerator::new(seed, &self.config);
        let hold = Duration::from_micros(self.config.hold_micros);
        let mut tally = WorkerTally::default();

        for _ in 0..self.config.transactions_per_worker {
            if self.cancel.is_cancelled() {
                break;
            }
            let plan = generator.next_plan();
            tally.planned += 1;

            let mut attempts = 0;
            loop {
                attempts += 1;
                let tx = Transaction::with_token(
                    next_id.fetch_add(1, Ordering::Relaxed),
                    self.cancel.child(),
                );
                match run_transaction(manager, &tx, &plan, hold, &mut tally.locks_granted) {
                    Ok(Attempt::Committed) => {
                        tally.committed += 1;
                        break;
                    }
                    Ok(Attempt::Terminated) => {
                        tally.terminated += 1;
                        break;
                    }
                    Err(err) if err.is_deadlock() => {
                        tally.deadlock_aborts += 1;
                        if attempts >= MAX_ATTEMPTS {
                            warn!("Giving up on a transaction after {attempts} deadlock aborts");
                            tally.gave_up += 1;
                            break;
                        }
                        thread::sleep(hold * attempts as u32);
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(tally)
    }
}

fn run_transaction(
    manager: &LockManager<ResourceKey, Transaction>,
    tx: &Transaction,
    plan: &[LockStep],
    hold: Duration,
    granted: &mut u64,
) -> Result<Attempt> {
    let mut held: Vec<&LockStep> = Vec::with_capacity(plan.len());

    for step in plan {
        match manager.acquire(&step.resource, tx, step.mode) {
            Ok(true) => {
                *granted += 1;
                held.push(step);
            }
            Ok(false) => {
                release_all(manager, tx, &held)?;
                return Ok(Attempt::Terminated);
            }
            Err(err) => {
                release_all(manager, tx, &held)?;
                return Err(err);
            }
        }
    }

    if !hold.is_zero() {
        thread::sleep(hold);
    }
    release_all(manager, tx, &held)?;
    Ok(Attempt::Committed)
}

fn release_all(
    manager: &LockManager<ResourceKey, Transaction>,
    tx: &Transaction,
    held: &[&LockStep],
) -> Result<()> {
    for step in held.iter().rev() {
        manager.release(&step.resource, tx, step.mode)?;
    }
    Ok(())
}
