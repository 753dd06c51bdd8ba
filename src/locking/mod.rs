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

pub mod acquisition;
pub mod cancellation;
mod detector;
pub mod dump;
mod entry;
mod graph;
pub mod manager;
pub mod mode;
pub mod owner;
pub mod resource;
pub mod scoped_guard;
pub mod snapshot;
mod table;
pub mod wait_observer;

pub use acquisition::{AcquireMode, AcquireOutcome};
pub use cancellation::{CancellationToken, global_token};
pub use dump::{LockDumpSink, LogSink};
pub use manager::LockManager;
pub use mode::LockMode;
pub use owner::{LockOwner, Transaction};
pub use resource::{LockResource, ResourceKey};
pub use scoped_guard::LockGuard;
pub use snapshot::{HolderSnapshot, LockSnapshot, WaiterSnapshot};
pub use wait_observer::{
    LockWaitObserver, NoopLockWaitObserver, ObserverChain, SlowWaitLogger, WaitStatistics,
    WaitStatisticsSnapshot,
};
