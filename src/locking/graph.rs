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

use crate::locking::entry::LockEntry;
use crate::locking::owner::LockOwner;
use crate::locking::resource::LockResource;
use std::collections::HashMap;

/// Read-only wait-for view over the lock table.
///
/// Edges are never stored; they are derived from the wait queues every time
/// they are asked for, so the view is exactly as consistent as the table
/// state it borrows.
pub(crate) struct WaitForGraph<'a, R, T> {
    entries: &'a HashMap<R, LockEntry<T>>,
    waiting: &'a HashMap<T, Vec<R>>,
}

impl<'a, R: LockResource, T: LockOwner> WaitForGraph<'a, R, T> {
    pub(crate) fn new(entries: &'a HashMap<R, LockEntry<T>>, waiting: &'a HashMap<T, Vec<R>>) -> Self {
        Self { entries, waiting }
    }

    /// Transactions `tx` is currently blocked on, over every resource it is queued for.
    pub(crate) fn successors(&self, tx: &T) -> Vec<T> {
        let mut successors = Vec::new();
        let Some(resources) = self.waiting.get(tx) else {
            return successors;
        };

        for resource in resources {
            let Some(entry) = self.entries.get(resource) else {
                continue;
            };
            for request in entry.waiters_of(tx) {
                for blocker in entry.blockers(tx, request.mode, Some(request.arrival())) {
                    if !successors.contains(&blocker) {
                        successors.push(blocker);
                    }
                }
            }
        }
        successors
    }

    pub(crate) fn edges(&self) -> Vec<(T, T)> {
        self.waiting
            .keys()
            .flat_map(|waiter| {
                self.successors(waiter)
                    .into_iter()
                    .map(move |blocker| (waiter.clone(), blocker))
            })
            .collect()
    }
}
