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

use crate::locking::mode::LockMode;
use crate::locking::wait_observer::LockWaitObserver;
use std::time::{Duration, Instant};

/// Indicates whether a lock request may block waiting for contention to clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireMode {
    Blocking,
    NonBlocking,
}

impl AcquireMode {
    pub fn is_blocking(self) -> bool {
        matches!(self, AcquireMode::Blocking)
    }
}

/// How a lock request ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Granted,
    /// A non-blocking request hit a conflict.
    NotGranted,
    /// The owner was terminated while queued.
    Terminated,
}

impl AcquireOutcome {
    pub fn is_granted(self) -> bool {
        matches!(self, AcquireOutcome::Granted)
    }
}

/// Tracks one parked request from registration until it leaves the queue.
pub(crate) struct WaitSession<'a, R, T> {
    resource: &'a R,
    tx: &'a T,
    mode: LockMode,
    observer: &'a dyn LockWaitObserver<R, T>,
    started_at: Instant,
    wakeups: usize,
}

impl<'a, R, T> WaitSession<'a, R, T> {
    pub(crate) fn new(
        resource: &'a R,
        tx: &'a T,
        mode: LockMode,
        observer: &'a dyn LockWaitObserver<R, T>,
    ) -> Self {
        Self {
            resource,
            tx,
            mode,
            observer,
            started_at: Instant::now(),
            wakeups: 0,
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub(crate) fn wakeups(&self) -> usize {
        self.wakeups
    }

    pub(crate) fn notify_wait_start(&self) {
        self.observer.on_wait_start(self.resource, self.tx, self.mode);
    }

    pub(crate) fn record_wakeup(&mut self) {
        self.wakeups = self.wakeups.saturating_add(1);
    }

    pub(crate) fn notify_wakeup(&self) {
        self.observer
            .on_wakeup(self.resource, self.tx, self.wakeups, self.elapsed());
    }

    pub(crate) fn notify_granted(&self) {
        self.observer
            .on_granted(self.resource, self.tx, self.mode, self.elapsed());
    }

    pub(crate) fn notify_terminated(&self) {
        self.observer
            .on_terminated(self.resource, self.tx, self.elapsed());
    }
}
