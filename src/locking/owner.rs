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

use crate::locking::cancellation::CancellationToken;
use std::fmt;
use std::hash::{Hash, Hasher};

/// The logical owner of locks.
///
/// Owners are compared by identity only. The lock table never mutates an
/// owner; it only polls [`LockOwner::is_terminated`] while the owner is parked
/// in a wait queue.
pub trait LockOwner: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {
    fn is_terminated(&self) -> bool {
        false
    }
}

impl LockOwner for u32 {}
impl LockOwner for u64 {}
impl LockOwner for usize {}
impl LockOwner for String {}
impl LockOwner for &'static str {}

/// Transaction handle whose termination can be requested from another thread.
#[derive(Clone)]
pub struct Transaction {
    id: u64,
    token: CancellationToken,
}

impl Transaction {
    pub fn new(id: u64) -> Self {
        Self::with_token(id, CancellationToken::new())
    }

    pub fn with_token(id: u64, token: CancellationToken) -> Self {
        Self { id, token }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Marks the transaction terminated. A blocked acquire observes this on
    /// its next wake-up and gives up its place in the wait queue.
    pub fn terminate(&self) {
        self.token.cancel();
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Transaction {}

impl Hash for Transaction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.id)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.id)
    }
}

impl LockOwner for Transaction {
    fn is_terminated(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn identity_ignores_token_state() {
        let tx = Transaction::new(4);
        let clone = tx.clone();
        tx.terminate();

        assert_eq!(tx, clone);
        assert!(clone.is_terminated());

        let mut set = HashSet::new();
        set.insert(tx);
        assert!(set.contains(&Transaction::new(4)));
    }

    #[test]
    fn plain_ids_never_terminate() {
        assert!(!7u64.is_terminated());
        assert!(!"tx".is_terminated());
    }

    #[test]
    fn renders_as_tx_label() {
        assert_eq!(format!("{:?}", Transaction::new(12)), "tx-12");
        assert_eq!(Transaction::new(12).to_string(), "tx-12");
    }
}
