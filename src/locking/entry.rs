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

//! Per-resource lock bookkeeping.
//!
//! A `LockEntry` only records who holds a resource and who is queued for it.
//! All mutation happens while the owning table's mutex is held, which is also
//! what makes the atomics on [`WaitTicket`] safe to use with relaxed ordering.

use crate::locking::mode::LockMode;
use crate::locking::owner::LockOwner;
use parking_lot::Condvar;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Parking spot for one blocked request.
#[derive(Debug)]
pub(crate) struct WaitTicket {
    arrival: u64,
    granted: AtomicBool,
    signal: Condvar,
}

impl WaitTicket {
    pub(crate) fn new(arrival: u64) -> Self {
        Self {
            arrival,
            granted: AtomicBool::new(false),
            signal: Condvar::new(),
        }
    }

    pub(crate) fn arrival(&self) -> u64 {
        self.arrival
    }

    pub(crate) fn is_granted(&self) -> bool {
        self.granted.load(Ordering::Relaxed)
    }

    pub(crate) fn grant(&self) {
        self.granted.store(true, Ordering::Relaxed);
        self.signal.notify_one();
    }

    pub(crate) fn wake(&self) {
        self.signal.notify_one();
    }

    pub(crate) fn signal(&self) -> &Condvar {
        &self.signal
    }
}

/// A request waiting in a resource's queue.
#[derive(Debug)]
pub(crate) struct QueuedRequest<T> {
    pub(crate) tx: T,
    pub(crate) mode: LockMode,
    pub(crate) ticket: Arc<WaitTicket>,
}

impl<T> QueuedRequest<T> {
    pub(crate) fn new(tx: T, mode: LockMode, ticket: Arc<WaitTicket>) -> Self {
        Self { tx, mode, ticket }
    }

    pub(crate) fn arrival(&self) -> u64 {
        self.ticket.arrival()
    }
}

#[derive(Debug)]
pub(crate) struct LockEntry<T> {
    read_holders: HashMap<T, usize>,
    write_holder: Option<(T, usize)>,
    wait_queue: VecDeque<QueuedRequest<T>>,
}

impl<T: LockOwner> LockEntry<T> {
    pub(crate) fn new() -> Self {
        Self {
            read_holders: HashMap::new(),
            write_holder: None,
            wait_queue: VecDeque::new(),
        }
    }

    /// True once nobody holds or awaits the resource; the table evicts such entries.
    pub(crate) fn is_empty(&self) -> bool {
        self.read_holders.is_empty() && self.write_holder.is_none() && self.wait_queue.is_empty()
    }

    pub(crate) fn has_waiters(&self) -> bool {
        !self.wait_queue.is_empty()
    }

    pub(crate) fn read_count(&self, tx: &T) -> usize {
        self.read_holders.get(tx).copied().unwrap_or(0)
    }

    pub(crate) fn write_count(&self, tx: &T) -> usize {
        match &self.write_holder {
            Some((writer, count)) if writer == tx => *count,
            _ => 0,
        }
    }

    pub(crate) fn holds_any(&self, tx: &T) -> bool {
        self.read_count(tx) > 0 || self.write_count(tx) > 0
    }

    /// A read is re-entrant for any current holder, a write only for the writer.
    pub(crate) fn can_reenter(&self, tx: &T, mode: LockMode) -> bool {
        match mode {
            LockMode::Read => self.holds_any(tx),
            LockMode::Write => self.write_count(tx) > 0,
        }
    }

    /// Whether granting `mode` to `tx` respects the current holders, ignoring the queue.
    pub(crate) fn is_compatible(&self, tx: &T, mode: LockMode) -> bool {
        let foreign_writer = self
            .write_holder
            .as_ref()
            .is_some_and(|(writer, _)| writer != tx);
        match mode {
            LockMode::Read => !foreign_writer,
            LockMode::Write => !foreign_writer && self.read_holders.keys().all(|reader| reader == tx),
        }
    }

    /// Records one more acquisition. Callers check compatibility first.
    pub(crate) fn grant(&mut self, tx: T, mode: LockMode) {
        match mode {
            LockMode::Read => *self.read_holders.entry(tx).or_insert(0) += 1,
            LockMode::Write => match &mut self.write_holder {
                Some((writer, count)) if *writer == tx => *count += 1,
                slot => *slot = Some((tx, 1)),
            },
        }
    }

    /// Drops one acquisition; returns false when `tx` holds no such lock.
    pub(crate) fn release(&mut self, tx: &T, mode: LockMode) -> bool {
        match mode {
            LockMode::Read => match self.read_holders.get_mut(tx) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    true
                }
                Some(_) => {
                    self.read_holders.remove(tx);
                    true
                }
                None => false,
            },
            LockMode::Write => match &mut self.write_holder {
                Some((writer, count)) if writer == tx => {
                    if *count > 1 {
                        *count -= 1;
                    } else {
                        self.write_holder = None;
                    }
                    true
                }
                _ => false,
            },
        }
    }

    pub(crate) fn enqueue(&mut self, request: QueuedRequest<T>) {
        self.wait_queue.push_back(request);
    }

    pub(crate) fn withdraw(&mut self, arrival: u64) -> Option<QueuedRequest<T>> {
        let position = self
            .wait_queue
            .iter()
            .position(|request| request.arrival() == arrival)?;
        self.wait_queue.remove(position)
    }

    /// Grants queued requests from the head while they fit the holders.
    ///
    /// The scan stops at the first request that does not fit, so a queued
    /// write keeps later reads from overtaking it.
    pub(crate) fn promote_waiters(&mut self) -> Vec<QueuedRequest<T>> {
        let mut promoted = Vec::new();
        while let Some(head) = self.wait_queue.front() {
            if !self.is_compatible(&head.tx, head.mode) {
                break;
            }
            if let Some(request) = self.wait_queue.pop_front() {
                self.grant(request.tx.clone(), request.mode);
                promoted.push(request);
            }
        }
        promoted
    }

    /// Transactions a `mode` request by `tx` has to wait for.
    ///
    /// These are conflicting holders plus conflicting requests queued before
    /// `ahead_of` (the whole queue when `None`, i.e. for a request that would
    /// join at the tail).
    pub(crate) fn blockers(&self, tx: &T, mode: LockMode, ahead_of: Option<u64>) -> Vec<T> {
        let mut blockers: Vec<T> = Vec::new();
        let mut push = |candidate: &T| {
            if candidate != tx && !blockers.contains(candidate) {
                blockers.push(candidate.clone());
            }
        };

        if let Some((writer, _)) = &self.write_holder {
            push(writer);
        }
        if mode.is_write() {
            self.read_holders.keys().for_each(&mut push);
        }
        for request in &self.wait_queue {
            if ahead_of.is_some_and(|arrival| request.arrival() >= arrival) {
                break;
            }
            if request.mode.conflicts_with(mode) {
                push(&request.tx);
            }
        }
        blockers
    }

    /// Every holder with its read and write counts.
    pub(crate) fn holders(&self) -> Vec<(T, usize, usize)> {
        let mut holders: Vec<(T, usize, usize)> = self
            .read_holders
            .iter()
            .map(|(tx, reads)| (tx.clone(), *reads, self.write_count(tx)))
            .collect();
        if let Some((writer, writes)) = &self.write_holder
            && !self.read_holders.contains_key(writer)
        {
            holders.push((writer.clone(), 0, *writes));
        }
        holders
    }

    pub(crate) fn waiters(&self) -> impl Iterator<Item = &QueuedRequest<T>> {
        self.wait_queue.iter()
    }

    pub(crate) fn waiters_of<'a>(&'a self, tx: &'a T) -> impl Iterator<Item = &'a QueuedRequest<T>> {
        self.wait_queue.iter().filter(move |request| &request.tx == tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(tx: u64, mode: LockMode, arrival: u64) -> QueuedRequest<u64> {
        QueuedRequest::new(tx, mode, Arc::new(WaitTicket::new(arrival)))
    }

    #[test]
    fn writer_excludes_other_holders() {
        let mut entry = LockEntry::new();
        entry.grant(1u64, LockMode::Write);

        assert!(!entry.is_compatible(&2, LockMode::Read));
        assert!(!entry.is_compatible(&2, LockMode::Write));
        assert!(entry.is_compatible(&1, LockMode::Read));
        assert!(entry.can_reenter(&1, LockMode::Write));
    }

    #[test]
    fn upgrade_requires_sole_reader() {
        let mut entry = LockEntry::new();
        entry.grant(1u64, LockMode::Read);
        assert!(entry.is_compatible(&1, LockMode::Write));

        entry.grant(2, LockMode::Read);
        assert!(!entry.is_compatible(&1, LockMode::Write));
        assert!(!entry.can_reenter(&1, LockMode::Write));
    }

    #[test]
    fn release_counts_down_and_reports_missing_locks() {
        let mut entry = LockEntry::new();
        entry.grant(1u64, LockMode::Read);
        entry.grant(1, LockMode::Read);

        assert!(entry.release(&1, LockMode::Read));
        assert_eq!(entry.read_count(&1), 1);
        assert!(entry.release(&1, LockMode::Read));
        assert!(!entry.release(&1, LockMode::Read));
        assert!(!entry.release(&1, LockMode::Write));
        assert!(entry.is_empty());
    }

    #[test]
    fn read_and_write_counts_are_independent() {
        let mut entry = LockEntry::new();
        entry.grant(1u64, LockMode::Write);
        entry.grant(1, LockMode::Read);

        assert!(entry.release(&1, LockMode::Write));
        assert_eq!(entry.read_count(&1), 1);
        assert_eq!(entry.write_count(&1), 0);
        assert_eq!(entry.holders(), vec![(1, 1, 0)]);
    }

    #[test]
    fn promotion_stops_at_first_conflicting_waiter() {
        let mut entry = LockEntry::new();
        entry.grant(0u64, LockMode::Write);
        entry.enqueue(queued(1, LockMode::Read, 1));
        entry.enqueue(queued(2, LockMode::Write, 2));
        entry.enqueue(queued(3, LockMode::Read, 3));

        assert!(entry.promote_waiters().is_empty());

        entry.release(&0, LockMode::Write);
        let promoted: Vec<u64> = entry.promote_waiters().into_iter().map(|r| r.tx).collect();
        assert_eq!(promoted, vec![1]);

        entry.release(&1, LockMode::Read);
        let promoted: Vec<u64> = entry.promote_waiters().into_iter().map(|r| r.tx).collect();
        assert_eq!(promoted, vec![2]);
    }

    #[test]
    fn consecutive_readers_are_promoted_together() {
        let mut entry = LockEntry::new();
        entry.grant(0u64, LockMode::Write);
        entry.enqueue(queued(1, LockMode::Read, 1));
        entry.enqueue(queued(2, LockMode::Read, 2));
        entry.enqueue(queued(3, LockMode::Write, 3));

        entry.release(&0, LockMode::Write);
        let promoted: Vec<u64> = entry.promote_waiters().into_iter().map(|r| r.tx).collect();
        assert_eq!(promoted, vec![1, 2]);
        assert!(entry.has_waiters());
    }

    #[test]
    fn blockers_include_conflicting_requests_ahead() {
        let mut entry = LockEntry::new();
        entry.grant(0u64, LockMode::Read);
        entry.grant(5, LockMode::Read);
        entry.enqueue(queued(1, LockMode::Write, 1));
        entry.enqueue(queued(2, LockMode::Read, 2));

        let mut for_reader = entry.blockers(&3, LockMode::Read, None);
        for_reader.sort();
        assert_eq!(for_reader, vec![1]);

        let mut for_writer = entry.blockers(&3, LockMode::Write, None);
        for_writer.sort();
        assert_eq!(for_writer, vec![0, 1, 2, 5]);

        let mut queued_writer = entry.blockers(&1, LockMode::Write, Some(1));
        queued_writer.sort();
        assert_eq!(queued_writer, vec![0, 5]);
    }

    #[test]
    fn withdraw_removes_only_the_matching_arrival() {
        let mut entry = LockEntry::new();
        entry.grant(0u64, LockMode::Write);
        entry.enqueue(queued(1, LockMode::Read, 7));
        entry.enqueue(queued(1, LockMode::Write, 8));

        let removed = entry.withdraw(7).unwrap();
        assert_eq!(removed.mode, LockMode::Read);
        assert_eq!(entry.waiters_of(&1).count(), 1);
        assert!(entry.withdraw(7).is_none());
    }
}
