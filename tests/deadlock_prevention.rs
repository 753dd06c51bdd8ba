mod common;

use common::{fast_manager, wait_for_waiters};
use std::thread;
use txlock::error::TxlockError;
use txlock::locking::{LockManager, LockMode};

#[test]
fn second_party_of_a_cycle_is_refused_and_first_proceeds() {
    let manager: LockManager<&'static str, u64> = fast_manager();
    assert!(manager.acquire_write(&"a", &1).unwrap());
    assert!(manager.acquire_write(&"b", &2).unwrap());

    thread::scope(|scope| {
        let first = scope.spawn(|| manager.acquire_write(&"b", &1));
        wait_for_waiters(&manager, &"b", 1);
        assert_eq!(manager.wait_for_edges(), vec![(1, 2)]);

        let err = manager.acquire_write(&"a", &2).unwrap_err();
        match err {
            TxlockError::DeadlockDetected {
                transaction, cycle, ..
            } => {
                assert_eq!(transaction, "2");
                assert_eq!(cycle, vec!["2", "1", "2"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(manager.detected_deadlock_count(), 1);

        // The refused request left no trace; the first waiter is still queued.
        let a = manager.snapshot(&"a").unwrap();
        assert!(a.waiters.is_empty());
        assert_eq!(manager.wait_for_edges(), vec![(1, 2)]);

        manager.release_write(&"b", &2).unwrap();
        assert!(first.join().unwrap().unwrap());
    });

    manager.release_write(&"b", &1).unwrap();
    manager.release_write(&"a", &1).unwrap();
    assert_eq!(manager.resource_count(), 0);
    assert_eq!(manager.detected_deadlock_count(), 1);
}

#[test]
fn three_party_cycle_is_refused() {
    let manager: LockManager<&'static str, u64> = fast_manager();
    assert!(manager.acquire_write(&"a", &1).unwrap());
    assert!(manager.acquire_write(&"b", &2).unwrap());
    assert!(manager.acquire_write(&"c", &3).unwrap());

    thread::scope(|scope| {
        let one = scope.spawn(|| manager.acquire_read(&"b", &1));
        wait_for_waiters(&manager, &"b", 1);
        let two = scope.spawn(|| manager.acquire_write(&"c", &2));
        wait_for_waiters(&manager, &"c", 1);

        let err = manager.acquire_read(&"a", &3).unwrap_err();
        assert!(err.is_deadlock());
        if let TxlockError::DeadlockDetected { cycle, .. } = err {
            assert_eq!(cycle, vec!["3", "1", "2", "3"]);
        }

        manager.release_write(&"c", &3).unwrap();
        assert!(two.join().unwrap().unwrap());
        manager.release_write(&"c", &2).unwrap();
        manager.release_write(&"b", &2).unwrap();
        assert!(one.join().unwrap().unwrap());
    });

    manager.release_read(&"b", &1).unwrap();
    manager.release_write(&"a", &1).unwrap();
    assert_eq!(manager.resource_count(), 0);
}

#[test]
fn concurrent_upgrades_refuse_the_second() {
    let manager: LockManager<&'static str, u64> = fast_manager();
    assert!(manager.acquire_read(&"r", &1).unwrap());
    assert!(manager.acquire_read(&"r", &2).unwrap());

    thread::scope(|scope| {
        let first = scope.spawn(|| manager.acquire_write(&"r", &1));
        wait_for_waiters(&manager, &"r", 1);

        let err = manager.acquire_write(&"r", &2).unwrap_err();
        assert!(err.is_deadlock());

        // Giving up the read lets the first upgrade through.
        manager.release_read(&"r", &2).unwrap();
        assert!(first.join().unwrap().unwrap());
    });

    let snapshot = manager.snapshot(&"r").unwrap();
    let holder = snapshot.holder("1").unwrap();
    assert_eq!((holder.read_count, holder.write_count), (1, 1));
    assert_eq!(manager.detected_deadlock_count(), 1);
}

#[test]
fn waiting_behind_a_queued_request_counts_as_a_dependency() {
    // 2 queues a write behind 9's read. 1 then asks for a read on "a"; no
    // holder conflicts with it, but it may not pass the queued write.
    let manager: LockManager<&'static str, u64> = fast_manager();
    assert!(manager.acquire_read(&"a", &9).unwrap());
    assert!(manager.acquire_write(&"b", &1).unwrap());

    thread::scope(|scope| {
        let writer = scope.spawn(|| manager.acquire_write(&"a", &2));
        wait_for_waiters(&manager, &"a", 1);
        let reader = scope.spawn(|| manager.acquire_read(&"a", &1));
        wait_for_waiters(&manager, &"a", 2);

        let mut edges = manager.wait_for_edges();
        edges.sort();
        assert_eq!(edges, vec![(1, 2), (2, 9)]);

        assert!(!manager.try_acquire_write(&"b", &3).unwrap());

        // 9 waiting on "b" would close 9 -> 1 -> 2 -> 9 through the queue.
        match manager.acquire_write(&"b", &9).unwrap_err() {
            TxlockError::DeadlockDetected { cycle, .. } => {
                assert_eq!(cycle, vec!["9", "1", "2", "9"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        manager.release_read(&"a", &9).unwrap();
        assert!(writer.join().unwrap().unwrap());
        manager.release_write(&"a", &2).unwrap();
        assert!(reader.join().unwrap().unwrap());
    });

    manager.release_read(&"a", &1).unwrap();
    manager.release_write(&"b", &1).unwrap();
    assert_eq!(manager.resource_count(), 0);
    assert_eq!(manager.detected_deadlock_count(), 1);
}

#[test]
fn refused_transaction_can_retry_after_releasing() {
    let manager: LockManager<&'static str, u64> = fast_manager();
    assert!(manager.acquire_write(&"a", &1).unwrap());
    assert!(manager.acquire_write(&"b", &2).unwrap());

    thread::scope(|scope| {
        let first = scope.spawn(|| manager.acquire(&"b", &1, LockMode::Write));
        wait_for_waiters(&manager, &"b", 1);

        assert!(manager.acquire_write(&"a", &2).unwrap_err().is_deadlock());
        manager.release_write(&"b", &2).unwrap();
        assert!(first.join().unwrap().unwrap());

        let retry = scope.spawn(|| manager.acquire_write(&"a", &2));
        wait_for_waiters(&manager, &"a", 1);
        manager.release_write(&"a", &1).unwrap();
        manager.release_write(&"b", &1).unwrap();
        assert!(retry.join().unwrap().unwrap());
    });

    manager.release_write(&"a", &2).unwrap();
    assert_eq!(manager.resource_count(), 0);
}
