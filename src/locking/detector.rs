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

//! Deadlock prevention at wait-registration time.
//!
//! Before a transaction is allowed to park, the detector searches the
//! wait-for graph breadth-first from every transaction the new wait would
//! point at. Reaching the would-be waiter means the new edge closes a cycle,
//! and the wait is refused instead of being registered.

use crate::locking::graph::WaitForGraph;
use crate::locking::owner::LockOwner;
use crate::locking::resource::LockResource;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct DeadlockDetector {
    detected: AtomicU64,
}

impl DeadlockDetector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn detected_count(&self) -> u64 {
        self.detected.load(Ordering::Relaxed)
    }

    /// Returns the cycle `waiter -> blocker -> ... -> waiter` that waiting on
    /// `blockers` would close, counting it as a detected deadlock.
    pub(crate) fn check<R: LockResource, T: LockOwner>(
        &self,
        graph: &WaitForGraph<'_, R, T>,
        waiter: &T,
        blockers: &[T],
    ) -> Option<Vec<T>> {
        let cycle = find_cycle(graph, waiter, blockers)?;
        self.detected.fetch_add(1, Ordering::Relaxed);
        Some(cycle)
    }
}

fn find_cycle<R: LockResource, T: LockOwner>(
    graph: &WaitForGraph<'_, R, T>,
    waiter: &T,
    blockers: &[T],
) -> Option<Vec<T>> {
    // Doubles as the visited set; roots have no parent.
    let mut parents: HashMap<T, Option<T>> = HashMap::new();
    let mut queue = VecDeque::new();

    for blocker in blockers {
        if !parents.contains_key(blocker) {
            parents.insert(blocker.clone(), None);
            queue.push_back(blocker.clone());
        }
    }

    while let Some(current) = queue.pop_front() {
        for next in graph.successors(&current) {
            if &next == waiter {
                return Some(trace_cycle(&parents, waiter, current));
            }
            if !parents.contains_key(&next) {
                parents.insert(next.clone(), Some(current.clone()));
                queue.push_back(next);
            }
        }
    }
    None
}

fn trace_cycle<T: LockOwner>(parents: &HashMap<T, Option<T>>, waiter: &T, last: T) -> Vec<T> {
    let mut path = vec![last.clone()];
    let mut cursor = last;
    while let Some(Some(parent)) = parents.get(&cursor) {
        path.push(parent.clone());
        cursor = parent.clone();
    }
    path.reverse();

    let mut cycle = Vec::with_capacity(path.len() + 2);
    cycle.push(waiter.clone());
    cycle.extend(path);
    cycle.push(waiter.clone());
    cycle
}
