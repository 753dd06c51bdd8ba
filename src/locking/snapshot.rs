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
use crate::locking::mode::LockMode;
use crate::locking::owner::LockOwner;
use serde::Serialize;
use std::fmt;

/// Point-in-time copy of one resource's lock state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockSnapshot {
    pub resource: String,
    pub holders: Vec<HolderSnapshot>,
    pub waiters: Vec<WaiterSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HolderSnapshot {
    pub transaction: String,
    pub read_count: usize,
    pub write_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaiterSnapshot {
    pub transaction: String,
    pub mode: LockMode,
    pub arrival: u64,
    pub waiting_for: Vec<String>,
}

impl LockSnapshot {
    pub(crate) fn capture<R: fmt::Debug, T: LockOwner>(resource: &R, entry: &LockEntry<T>) -> Self {
        let mut holders: Vec<HolderSnapshot> = entry
            .holders()
            .into_iter()
            .map(|(tx, read_count, write_count)| HolderSnapshot {
                transaction: format!("{tx:?}"),
                read_count,
                write_count,
            })
            .collect();
        holders.sort_by(|a, b| a.transaction.cmp(&b.transaction));

        let waiters = entry
            .waiters()
            .map(|request| WaiterSnapshot {
                transaction: format!("{:?}", request.tx),
                mode: request.mode,
                arrival: request.arrival(),
                waiting_for: entry
                    .blockers(&request.tx, request.mode, Some(request.arrival()))
                    .iter()
                    .map(|blocker| format!("{blocker:?}"))
                    .collect(),
            })
            .collect();

        Self {
            resource: format!("{resource:?}"),
            holders,
            waiters,
        }
    }

    pub fn holder(&self, transaction: &str) -> Option<&HolderSnapshot> {
        self.holders
            .iter()
            .find(|holder| holder.transaction == transaction)
    }

    /// Transactions in the wait queue, in arrival order.
    pub fn waiting_transactions(&self) -> Vec<&str> {
        self.waiters
            .iter()
            .map(|waiter| waiter.transaction.as_str())
            .collect()
    }

    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("Locks on {}:", self.resource)];
        if self.holders.is_empty() {
            lines.push("  holders: none".to_string());
        } else {
            lines.push("  holders:".to_string());
            for holder in &self.holders {
                lines.push(format!(
                    "    {} (read={}, write={})",
                    holder.transaction, holder.read_count, holder.write_count
                ));
            }
        }
        if self.waiters.is_empty() {
            lines.push("  waiters: none".to_string());
        } else {
            lines.push("  waiters (arrival order):".to_string());
            for waiter in &self.waiters {
                lines.push(format!(
                    "    #{} {} wants {}, waiting for [{}]",
                    waiter.arrival,
                    waiter.transaction,
                    waiter.mode,
                    waiter.waiting_for.join(", ")
                ));
            }
        }
        lines
    }
}
