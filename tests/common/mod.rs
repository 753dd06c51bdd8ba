#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use txlock::config::LockingConfig;
use txlock::locking::{LockManager, LockOwner, LockResource, NoopLockWaitObserver};

/// Manager with a short termination poll so tests never wait long.
pub fn fast_manager<R: LockResource, T: LockOwner>() -> LockManager<R, T> {
    let config = LockingConfig {
        termination_poll_ms: 5,
        ..LockingConfig::default()
    };
    LockManager::with_config(&config, Arc::new(NoopLockWaitObserver))
}

/// Blocks until `resource` has `count` queued requests.
pub fn wait_for_waiters<R: LockResource, T: LockOwner>(
    manager: &LockManager<R, T>,
    resource: &R,
    count: usize,
) {
    wait_until(|| {
        manager
            .snapshot(resource)
            .is_some_and(|snapshot| snapshot.waiters.len() == count)
    });
}

pub fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(2));
    }
}
