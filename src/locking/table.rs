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

//! The lock table: resource entries, wait registrations and hand-over.
//!
//! Every structural change happens under a single `parking_lot::Mutex`, so
//! the deadlock detector always sees a consistent wait-for graph. Blocked
//! requests park on their own condition variable paired with that mutex and
//! are granted by the releasing thread, which pops them off the queue in
//! arrival order before waking them.

use crate::error::{Result, TxlockError};
use crate::locking::acquisition::{AcquireMode, AcquireOutcome, WaitSession};
use crate::locking::detector::DeadlockDetector;
use crate::locking::dump::{LockDumpSink, LogSink};
use crate::locking::entry::{LockEntry, QueuedRequest, WaitTicket};
use crate::locking::graph::WaitForGraph;
use crate::locking::mode::LockMode;
use crate::locking::owner::LockOwner;
use crate::locking::resource::LockResource;
use crate::locking::snapshot::LockSnapshot;
use crate::locking::wait_observer::LockWaitObserver;
use log::{debug, info, trace};
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

struct TableState<R, T> {
    entries: HashMap<R, LockEntry<T>>,
    /// Resources each parked transaction is queued on.
    waiting: HashMap<T, Vec<R>>,
    next_arrival: u64,
}

enum Registration<T> {
    Granted,
    Refused,
    Queued(Arc<WaitTicket>),
    Deadlock(Vec<T>),
}

/// Returned when the table mutex could not be taken within a dump timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TableBusy;

pub(crate) struct LockTable<R, T> {
    state: Mutex<TableState<R, T>>,
    detector: DeadlockDetector,
    observer: Arc<dyn LockWaitObserver<R, T>>,
    termination_poll: Duration,
    dump_on_deadlock: bool,
}

impl<R: LockResource, T: LockOwner> LockTable<R, T> {
    pub(crate) fn new(
        observer: Arc<dyn LockWaitObserver<R, T>>,
        termination_poll: Duration,
        dump_on_deadlock: bool,
    ) -> Self {
        Self {
            state: Mutex::new(TableState {
                entries: HashMap::new(),
                waiting: HashMap::new(),
                next_arrival: 0,
            }),
            detector: DeadlockDetector::new(),
            observer,
            termination_poll,
            dump_on_deadlock,
        }
    }

    pub(crate) fn acquire(
        &self,
        resource: &R,
        tx: &T,
        mode: LockMode,
        acquire_mode: AcquireMode,
    ) -> Result<AcquireOutcome> {
        ensure_legal(resource)?;

        let mut state = self.state.lock();
        let ticket = match self.register(&mut state, resource, tx, mode, acquire_mode) {
            Registration::Granted => {
                debug!("{tx:?} acquired {mode} lock on {resource:?}");
                return Ok(AcquireOutcome::Granted);
            }
            Registration::Refused => {
                debug!("{tx:?} could not acquire {mode} lock on {resource:?} without waiting");
                return Ok(AcquireOutcome::NotGranted);
            }
            Registration::Deadlock(cycle) => {
                let snapshot = if self.dump_on_deadlock {
                    state
                        .entries
                        .get(resource)
                        .map(|entry| LockSnapshot::capture(resource, entry))
                } else {
                    None
                };
                drop(state);
                return Err(self.refuse(resource, tx, mode, cycle, snapshot));
            }
            Registration::Queued(ticket) => ticket,
        };

        debug!(
            "{tx:?} waiting for {mode} lock on {resource:?} (arrival #{})",
            ticket.arrival()
        );
        let mut session = WaitSession::new(resource, tx, mode, self.observer.as_ref());
        MutexGuard::unlocked(&mut state, || session.notify_wait_start());

        loop {
            if ticket.is_granted() {
                drop(state);
                debug!(
                    "{tx:?} acquired {mode} lock on {resource:?} after {} wake-ups",
                    session.wakeups()
                );
                session.notify_granted();
                return Ok(AcquireOutcome::Granted);
            }

            if tx.is_terminated() {
                self.withdraw(&mut state, resource, tx, &ticket);
                drop(state);
                debug!("{tx:?} terminated while waiting for {mode} lock on {resource:?}");
                session.notify_terminated();
                return Ok(AcquireOutcome::Terminated);
            }

            ticket.signal().wait_for(&mut state, self.termination_poll);
            session.record_wakeup();
            MutexGuard::unlocked(&mut state, || session.notify_wakeup());
        }
    }

    fn register(
        &self,
        state: &mut TableState<R, T>,
        resource: &R,
        tx: &T,
        mode: LockMode,
        acquire_mode: AcquireMode,
    ) -> Registration<T> {
        let entry = state
            .entries
            .entry(resource.clone())
            .or_insert_with(LockEntry::new);

        if entry.can_reenter(tx, mode)
            || (entry.is_compatible(tx, mode) && (!entry.has_waiters() || entry.holds_any(tx)))
        {
            entry.grant(tx.clone(), mode);
            return Registration::Granted;
        }

        if !acquire_mode.is_blocking() {
            return Registration::Refused;
        }

        let blockers = entry.blockers(tx, mode, None);
        if blockers.is_empty() {
            // Only compatible requests are queued and none of them are ahead of a conflict.
            entry.grant(tx.clone(), mode);
            return Registration::Granted;
        }

        let graph = WaitForGraph::new(&state.entries, &state.waiting);
        if let Some(cycle) = self.detector.check(&graph, tx, &blockers) {
            return Registration::Deadlock(cycle);
        }

        state.next_arrival += 1;
        let ticket = Arc::new(WaitTicket::new(state.next_arrival));
        if let Some(entry) = state.entries.get_mut(resource) {
            entry.enqueue(QueuedRequest::new(tx.clone(), mode, ticket.clone()));
        }
        state
            .waiting
            .entry(tx.clone())
            .or_default()
            .push(resource.clone());
        Registration::Queued(ticket)
    }

    fn refuse(
        &self,
        resource: &R,
        tx: &T,
        mode: LockMode,
        cycle: Vec<T>,
        snapshot: Option<LockSnapshot>,
    ) -> TxlockError {
        let path: Vec<String> = cycle.iter().map(|member| format!("{member:?}")).collect();
        info!(
            "Refused {mode} lock on {resource:?} for {tx:?}: waiting would close the cycle {}",
            path.join(" -> ")
        );
        self.observer.on_deadlock(resource, tx, &cycle);

        if let Some(snapshot) = snapshot {
            let mut sink = LogSink::default();
            for line in snapshot.render_lines() {
                sink.write_line(&line);
            }
        }

        TxlockError::DeadlockDetected {
            resource: format!("{resource:?}"),
            transaction: format!("{tx:?}"),
            cycle: path,
        }
    }

    /// Removes a terminated waiter and lets the requests behind it move up.
    fn withdraw(&self, state: &mut TableState<R, T>, resource: &R, tx: &T, ticket: &WaitTicket) {
        unregister_wait(&mut state.waiting, tx, resource);
        let Some(entry) = state.entries.get_mut(resource) else {
            return;
        };
        entry.withdraw(ticket.arrival());
        let promoted = entry.promote_waiters();
        hand_over(&mut state.waiting, resource, promoted);
        evict_if_empty(&mut state.entries, resource);
    }

    pub(crate) fn release(&self, resource: &R, tx: &T, mode: LockMode) -> Result<()> {
        ensure_legal(resource)?;

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let released = state
            .entries
            .get_mut(resource)
            .is_some_and(|entry| entry.release(tx, mode));
        if !released {
            return Err(TxlockError::LockNotFound {
                resource: format!("{resource:?}"),
                transaction: format!("{tx:?}"),
                mode,
            });
        }

        let promoted = state
            .entries
            .get_mut(resource)
            .map(LockEntry::promote_waiters)
            .unwrap_or_default();
        hand_over(&mut state.waiting, resource, promoted);
        evict_if_empty(&mut state.entries, resource);
        drop(guard);

        debug!("{tx:?} released {mode} lock on {resource:?}");
        Ok(())
    }

    /// Wakes every request `tx` has parked so it re-checks termination now.
    pub(crate) fn wake_waiters(&self, tx: &T) {
        let state = self.state.lock();
        let Some(resources) = state.waiting.get(tx) else {
            return;
        };
        for resource in resources {
            if let Some(entry) = state.entries.get(resource) {
                entry
                    .waiters_of(tx)
                    .for_each(|request| request.ticket.wake());
            }
        }
    }

    pub(crate) fn snapshot(&self, resource: &R) -> Option<LockSnapshot> {
        let state = self.state.lock();
        state
            .entries
            .get(resource)
            .map(|entry| LockSnapshot::capture(resource, entry))
    }

    /// Like [`LockTable::snapshot`] but gives up after `timeout`.
    pub(crate) fn try_snapshot(
        &self,
        resource: &R,
        timeout: Duration,
    ) -> std::result::Result<Option<LockSnapshot>, TableBusy> {
        let state = self.state.try_lock_for(timeout).ok_or(TableBusy)?;
        Ok(state
            .entries
            .get(resource)
            .map(|entry| LockSnapshot::capture(resource, entry)))
    }

    /// Snapshots of every tracked resource, ordered by their rendered name.
    pub(crate) fn snapshot_all(&self) -> Vec<LockSnapshot> {
        let state = self.state.lock();
        let mut snapshots: Vec<LockSnapshot> = state
            .entries
            .iter()
            .map(|(resource, entry)| LockSnapshot::capture(resource, entry))
            .collect();
        snapshots.sort_by(|a, b| a.resource.cmp(&b.resource));
        snapshots
    }

    pub(crate) fn wait_for_edges(&self) -> Vec<(T, T)> {
        let state = self.state.lock();
        WaitForGraph::new(&state.entries, &state.waiting).edges()
    }

    pub(crate) fn resource_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub(crate) fn detected_deadlock_count(&self) -> u64 {
        self.detector.detected_count()
    }

    /// Runs `f` while the table mutex is held by the calling thread.
    #[cfg(test)]
    pub(crate) fn while_locked<U>(&self, f: impl FnOnce() -> U) -> U {
        let _state = self.state.lock();
        f()
    }
}

fn ensure_legal<R: LockResource>(resource: &R) -> Result<()> {
    if resource.is_legal() {
        Ok(())
    } else {
        Err(TxlockError::IllegalResource(format!("{resource:?}")))
    }
}

fn hand_over<R: LockResource, T: LockOwner>(
    waiting: &mut HashMap<T, Vec<R>>,
    resource: &R,
    promoted: Vec<QueuedRequest<T>>,
) {
    for request in promoted {
        trace!(
            "Handing {} lock on {resource:?} to {:?} (arrival #{})",
            request.mode,
            request.tx,
            request.arrival()
        );
        unregister_wait(waiting, &request.tx, resource);
        request.ticket.grant();
    }
}

fn unregister_wait<R: LockResource, T: LockOwner>(
    waiting: &mut HashMap<T, Vec<R>>,
    tx: &T,
    resource: &R,
) {
    let Some(resources) = waiting.get_mut(tx) else {
        return;
    };
    if let Some(position) = resources.iter().position(|queued| queued == resource) {
        resources.swap_remove(position);
    }
    if resources.is_empty() {
        waiting.remove(tx);
    }
}

fn evict_if_empty<R: LockResource, T: LockOwner>(entries: &mut HashMap<R, LockEntry<T>>, resource: &R) {
    if entries.get(resource).is_some_and(LockEntry::is_empty) {
        entries.remove(resource);
    }
}
