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

use crate::config::LockingConfig;
use crate::error::Result;
use crate::locking::acquisition::{AcquireMode, AcquireOutcome};
use crate::locking::dump::LockDumpSink;
use crate::locking::mode::LockMode;
use crate::locking::owner::LockOwner;
use crate::locking::resource::LockResource;
use crate::locking::scoped_guard::LockGuard;
use crate::locking::snapshot::LockSnapshot;
use crate::locking::table::{LockTable, TableBusy};
use crate::locking::wait_observer::{LockWaitObserver, NoopLockWaitObserver, format_duration};
use log::warn;
use std::sync::Arc;
use std::time::Duration;

/// Read/write locks on resources of type `R` held by transactions of type `T`.
///
/// Blocking acquires refuse to wait when waiting would close a cycle in the
/// wait-for graph, returning [`TxlockError::DeadlockDetected`] with the table
/// left as it was. A blocking acquire by a transaction that gets terminated
/// while queued returns `Ok(false)`. Locks are re-entrant and counted per
/// mode; every successful acquire needs a matching release.
///
/// [`TxlockError::DeadlockDetected`]: crate::error::TxlockError::DeadlockDetected
pub struct LockManager<R: LockResource, T: LockOwner> {
    table: LockTable<R, T>,
    dump_timeout: Duration,
}

impl<R: LockResource, T: LockOwner> LockManager<R, T> {
    pub fn new() -> Self {
        Self::with_observer(Arc::new(NoopLockWaitObserver))
    }

    pub fn with_observer(observer: Arc<dyn LockWaitObserver<R, T>>) -> Self {
        Self::with_config(&LockingConfig::default(), observer)
    }

    pub fn with_config(config: &LockingConfig, observer: Arc<dyn LockWaitObserver<R, T>>) -> Self {
        Self {
            table: LockTable::new(
                observer,
                config.termination_poll(),
                config.dump_on_deadlock,
            ),
            dump_timeout: config.dump_timeout(),
        }
    }

    /// Blocks until `mode` is granted. Returns `Ok(false)` only when `tx` was
    /// terminated while waiting.
    pub fn acquire(&self, resource: &R, tx: &T, mode: LockMode) -> Result<bool> {
        let outcome = self
            .table
            .acquire(resource, tx, mode, AcquireMode::Blocking)?;
        Ok(outcome.is_granted())
    }

    /// Grants `mode` only if that is possible without waiting.
    pub fn try_acquire(&self, resource: &R, tx: &T, mode: LockMode) -> Result<bool> {
        let outcome = self
            .table
            .acquire(resource, tx, mode, AcquireMode::NonBlocking)?;
        Ok(outcome == AcquireOutcome::Granted)
    }

    pub fn acquire_read(&self, resource: &R, tx: &T) -> Result<bool> {
        self.acquire(resource, tx, LockMode::Read)
    }

    pub fn acquire_write(&self, resource: &R, tx: &T) -> Result<bool> {
        self.acquire(resource, tx, LockMode::Write)
    }

    pub fn try_acquire_read(&self, resource: &R, tx: &T) -> Result<bool> {
        self.try_acquire(resource, tx, LockMode::Read)
    }

    pub fn try_acquire_write(&self, resource: &R, tx: &T) -> Result<bool> {
        self.try_acquire(resource, tx, LockMode::Write)
    }

    pub fn release(&self, resource: &R, tx: &T, mode: LockMode) -> Result<()> {
        self.table.release(resource, tx, mode)
    }

    pub fn release_read(&self, resource: &R, tx: &T) -> Result<()> {
        self.release(resource, tx, LockMode::Read)
    }

    pub fn release_write(&self, resource: &R, tx: &T) -> Result<()> {
        self.release(resource, tx, LockMode::Write)
    }

    /// Number of waits refused so far. Never decreases.
    pub fn detected_deadlock_count(&self) -> u64 {
        self.table.detected_deadlock_count()
    }

    /// Writes the holders and waiters of `resource` to `sink`.
    pub fn dump_locks<S: LockDumpSink + ?Sized>(&self, resource: &R, sink: &mut S) {
        match self.table.try_snapshot(resource, self.dump_timeout) {
            Ok(Some(snapshot)) => {
                for line in snapshot.render_lines() {
                    sink.write_line(&line);
                }
            }
            Ok(None) => sink.write_line(&format!("Locks on {resource:?}: none")),
            Err(TableBusy) => {
                warn!(
                    "Lock table busy for {}, skipping dump of {resource:?}",
                    format_duration(self.dump_timeout)
                );
                sink.write_line(&format!(
                    "Locks on {resource:?}: lock table busy, dump skipped"
                ));
            }
        }
    }

    pub fn snapshot(&self, resource: &R) -> Option<LockSnapshot> {
        self.table.snapshot(resource)
    }

    /// Snapshots of every resource that currently has holders or waiters.
    pub fn snapshots(&self) -> Vec<LockSnapshot> {
        self.table.snapshot_all()
    }

    /// Current `(waiter, blocker)` edges of the wait-for graph.
    pub fn wait_for_edges(&self) -> Vec<(T, T)> {
        self.table.wait_for_edges()
    }

    pub fn resource_count(&self) -> usize {
        self.table.resource_count()
    }

    /// Makes every parked request of `tx` re-check termination immediately.
    pub fn wake_waiters(&self, tx: &T) {
        self.table.wake_waiters(tx);
    }

    /// Blocking acquire that returns a guard, or `None` when `tx` was terminated.
    pub fn lock(&self, resource: R, tx: T, mode: LockMode) -> Result<Option<LockGuard<'_, R, T>>> {
        if self.acquire(&resource, &tx, mode)? {
            Ok(Some(LockGuard::new(self, resource, tx, mode)))
        } else {
            Ok(None)
        }
    }

    pub fn lock_read(&self, resource: R, tx: T) -> Result<Option<LockGuard<'_, R, T>>> {
        self.lock(resource, tx, LockMode::Read)
    }

    pub fn lock_write(&self, resource: R, tx: T) -> Result<Option<LockGuard<'_, R, T>>> {
        self.lock(resource, tx, LockMode::Write)
    }

    pub fn try_lock(&self, resource: R, tx: T, mode: LockMode) -> Result<Option<LockGuard<'_, R, T>>> {
        if self.try_acquire(&resource, &tx, mode)? {
            Ok(Some(LockGuard::new(self, resource, tx, mode)))
        } else {
            Ok(None)
        }
    }
}

impl<R: LockResource, T: LockOwner> Default for LockManager<R, T> {
    fn default() -> Self {
        Self::new()
    }
}
