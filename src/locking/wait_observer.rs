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

//! Observer interfaces for lock wait instrumentation.
//!
//! Observers decouple the lock table from whoever wants to know about
//! contention (statistics, log output) so the table itself only has to call
//! a handful of hooks. Hooks run on the waiting thread after the table mutex
//! has been released, so an observer may take its own locks freely, but it
//! must not block for long: the calling thread is a lock requester.

use crate::locking::mode::LockMode;
use log::warn;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Observer hooks for lock wait events.
pub trait LockWaitObserver<R, T>: Send + Sync {
    fn on_wait_start(&self, _resource: &R, _tx: &T, _mode: LockMode) {}

    fn on_wakeup(&self, _resource: &R, _tx: &T, _wakeups: usize, _elapsed: Duration) {}

    fn on_granted(&self, _resource: &R, _tx: &T, _mode: LockMode, _waited: Duration) {}

    fn on_deadlock(&self, _resource: &R, _tx: &T, _cycle: &[T]) {}

    fn on_terminated(&self, _resource: &R, _tx: &T, _waited: Duration) {}
}

/// Observer implementation that performs no work.
#[derive(Debug, Default)]
pub struct NoopLockWaitObserver;

impl<R, T> LockWaitObserver<R, T> for NoopLockWaitObserver {}

/// Aggregated counters over every wait seen by the observer.
#[derive(Debug, Default)]
pub struct WaitStatistics {
    waits: AtomicU64,
    granted_after_wait: AtomicU64,
    deadlocks: AtomicU64,
    terminated: AtomicU64,
    total_wait_micros: AtomicU64,
    max_wait_micros: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct WaitStatisticsSnapshot {
    pub waits: u64,
    pub granted_after_wait: u64,
    pub deadlocks: u64,
    pub terminated: u64,
    pub total_wait_micros: u64,
    pub max_wait_micros: u64,
}

impl WaitStatisticsSnapshot {
    pub fn mean_wait(&self) -> Duration {
        let finished = self.granted_after_wait + self.terminated;
        if finished == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.total_wait_micros / finished)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_micros(self.max_wait_micros)
    }
}

impl WaitStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> WaitStatisticsSnapshot {
        WaitStatisticsSnapshot {
            waits: self.waits.load(Ordering::Relaxed),
            granted_after_wait: self.granted_after_wait.load(Ordering::Relaxed),
            deadlocks: self.deadlocks.load(Ordering::Relaxed),
            terminated: self.terminated.load(Ordering::Relaxed),
            total_wait_micros: self.total_wait_micros.load(Ordering::Relaxed),
            max_wait_micros: self.max_wait_micros.load(Ordering::Relaxed),
        }
    }

    fn record_wait(&self, waited: Duration) {
        let micros = u64::try_from(waited.as_micros()).unwrap_or(u64::MAX);
        self.total_wait_micros.fetch_add(micros, Ordering::Relaxed);
        self.max_wait_micros.fetch_max(micros, Ordering::Relaxed);
    }
}

impl<R, T> LockWaitObserver<R, T> for WaitStatistics {
    fn on_wait_start(&self, _resource: &R, _tx: &T, _mode: LockMode) {
        self.waits.fetch_add(1, Ordering::Relaxed);
    }

    fn on_granted(&self, _resource: &R, _tx: &T, _mode: LockMode, waited: Duration) {
        self.granted_after_wait.fetch_add(1, Ordering::Relaxed);
        self.record_wait(waited);
    }

    fn on_deadlock(&self, _resource: &R, _tx: &T, _cycle: &[T]) {
        self.deadlocks.fetch_add(1, Ordering::Relaxed);
    }

    fn on_terminated(&self, _resource: &R, _tx: &T, waited: Duration) {
        self.terminated.fetch_add(1, Ordering::Relaxed);
        self.record_wait(waited);
    }
}

/// Warns through the `log` facade about waits that outlast `threshold`.
#[derive(Debug, Clone)]
pub struct SlowWaitLogger {
    threshold: Duration,
}

impl SlowWaitLogger {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    fn is_slow(&self, waited: Duration) -> bool {
        waited >= self.threshold
    }
}

impl<R: fmt::Debug, T: fmt::Debug> LockWaitObserver<R, T> for SlowWaitLogger {
    fn on_wakeup(&self, resource: &R, tx: &T, wakeups: usize, elapsed: Duration) {
        // Every 20th wake-up past the threshold, not on every poll.
        if self.is_slow(elapsed) && wakeups % 20 == 0 {
            warn!(
                "{tx:?} still waiting for {resource:?} after {} ({wakeups} wake-ups)",
                format_duration(elapsed)
            );
        }
    }

    fn on_granted(&self, resource: &R, tx: &T, mode: LockMode, waited: Duration) {
        if self.is_slow(waited) {
            warn!(
                "{tx:?} acquired {mode} lock on {resource:?} after {}",
                format_duration(waited)
            );
        }
    }

    fn on_terminated(&self, resource: &R, tx: &T, waited: Duration) {
        if self.is_slow(waited) {
            warn!(
                "{tx:?} stopped waiting for {resource:?} after {}: transaction terminated",
                format_duration(waited)
            );
        }
    }
}

/// Forwards every hook to each observer in order.
pub struct ObserverChain<R, T> {
    observers: Vec<Arc<dyn LockWaitObserver<R, T>>>,
}

impl<R, T> ObserverChain<R, T> {
    pub fn new(observers: Vec<Arc<dyn LockWaitObserver<R, T>>>) -> Self {
        Self { observers }
    }
}

impl<R, T> LockWaitObserver<R, T> for ObserverChain<R, T> {
    fn on_wait_start(&self, resource: &R, tx: &T, mode: LockMode) {
        for observer in &self.observers {
            observer.on_wait_start(resource, tx, mode);
        }
    }

    fn on_wakeup(&self, resource: &R, tx: &T, wakeups: usize, elapsed: Duration) {
        for observer in &self.observers {
            observer.on_wakeup(resource, tx, wakeups, elapsed);
        }
    }

    fn on_granted(&self, resource: &R, tx: &T, mode: LockMode, waited: Duration) {
        for observer in &self.observers {
            observer.on_granted(resource, tx, mode, waited);
        }
    }

    fn on_deadlock(&self, resource: &R, tx: &T, cycle: &[T]) {
        for observer in &self.observers {
            observer.on_deadlock(resource, tx, cycle);
        }
    }

    fn on_terminated(&self, resource: &R, tx: &T, waited: Duration) {
        for observer in &self.observers {
            observer.on_terminated(resource, tx, waited);
        }
    }
}

pub(crate) fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.1}s", duration.as_secs_f32())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
