use crate::config::LockingConfig;
use crate::error::{Result, TxlockError};
use crate::locking::{LockManager, LockSnapshot, NoopLockWaitObserver, ResourceKey, Transaction};
use colored::Colorize;
use log::debug;
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub action: String,
    pub result: String,
}

/// What happened in one scripted scenario, plus the lock state it ended on.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: &'static str,
    pub steps: Vec<StepRecord>,
    pub dump: Vec<String>,
    pub snapshots: Vec<LockSnapshot>,
    pub deadlocks_detected: u64,
}

impl ScenarioReport {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            steps: Vec::new(),
            dump: Vec::new(),
            snapshots: Vec::new(),
            deadlocks_detected: 0,
        }
    }

    fn record(&mut self, action: impl Into<String>, result: impl Into<String>) {
        self.steps.push(StepRecord {
            action: action.into(),
            result: result.into(),
        });
    }
}

pub struct ScenarioCommand<'a> {
    locking: &'a LockingConfig,
}

impl<'a> ScenarioCommand<'a> {
    pub fn new(locking: &'a LockingConfig) -> Result<Self> {
        Ok(Self { locking })
    }

    pub fn execute(&self, json: bool) -> Result<()> {
        let reports = vec![self.run_basic()?, self.run_deadlock()?];

        if json {
            println!("{}", serde_json::to_string_pretty(&reports)?);
            return Ok(());
        }

        for report in &reports {
            println!("{}", format!("Scenario: {}", report.name).bold());
            for step in &report.steps {
                println!("  {:<36} {}", step.action, step.result.cyan());
            }
            println!();
            for line in &report.dump {
                println!("  {line}");
            }
            println!(
                "  Deadlocks detected: {}",
                report.deadlocks_detected.to_string().yellow()
            );
            println!();
        }
        Ok(())
    }

    fn manager(&self) -> LockManager<ResourceKey, Transaction> {
        LockManager::with_config(self.locking, Arc::new(NoopLockWaitObserver))
    }

    /// Write exclusion, non-blocking reads and an unbalanced release on one resource.
    pub fn run_basic(&self) -> Result<ScenarioReport> {
        let manager = self.manager();
        let resource = ResourceKey::named("R");
        let t1 = Transaction::new(1);
        let t2 = Transaction::new(2);
        let mut report = ScenarioReport::new("basic");

        let granted = manager.acquire_write(&resource, &t1)?;
        report.record("tx-1 acquire_write(R)", granted.to_string());

        let granted = manager.try_acquire_read(&resource, &t2)?;
        report.record("tx-2 try_acquire_read(R)", granted.to_string());
        manager.dump_locks(&resource, &mut report.dump);

        manager.release_write(&resource, &t1)?;
        report.record("tx-1 release_write(R)", "ok");

        let granted = manager.try_acquire_read(&resource, &t2)?;
        report.record("tx-2 try_acquire_read(R)", granted.to_string());

        manager.release_read(&resource, &t2)?;
        report.record("tx-2 release_read(R)", "ok");

        let result = match manager.release_read(&resource, &t2) {
            Ok(()) => "ok".to_string(),
            Err(err @ TxlockError::LockNotFound { .. }) => format!("error: {err}"),
            Err(err) => return Err(err),
        };
        report.record("tx-2 release_read(R)", result);

        report.snapshots = manager.snapshots();
        report.deadlocks_detected = manager.detected_deadlock_count();
        Ok(report)
    }

    /// Two transactions each holding what the other wants; the second wait is refused.
    pub fn run_deadlock(&self) -> Result<ScenarioReport> {
        let manager = self.manager();
        let a = ResourceKey::named("A");
        let b = ResourceKey::named("B");
        let t1 = Transaction::new(1);
        let t2 = Transaction::new(2);
        let mut report = ScenarioReport::new("deadlock");

        manager.acquire_write(&a, &t1)?;
        report.record("tx-1 acquire_write(A)", "true");
        manager.acquire_write(&b, &t2)?;
        report.record("tx-2 acquire_write(B)", "true");

        thread::scope(|scope| -> Result<()> {
            let waiter = scope.spawn(|| manager.acquire_write(&b, &t1));
            while !waiter.is_finished()
                && manager
                    .snapshot(&b)
                    .is_none_or(|snapshot| snapshot.waiters.is_empty())
            {
                thread::sleep(Duration::from_millis(1));
            }
            report.record("tx-1 acquire_write(B)", "waiting");

            let result = match manager.acquire_write(&a, &t2) {
                Ok(granted) => granted.to_string(),
                Err(err @ TxlockError::DeadlockDetected { .. }) => {
                    debug!("Scenario refusal: {err}");
                    format!("error: {err}")
                }
                Err(err) => return Err(err),
            };
            report.record("tx-2 acquire_write(A)", result);
            manager.dump_locks(&a, &mut report.dump);
            manager.dump_locks(&b, &mut report.dump);
            report.snapshots = manager.snapshots();

            manager.release_write(&b, &t2)?;
            report.record("tx-2 release_write(B)", "ok");

            let granted = match waiter.join() {
                Ok(result) => result?,
                Err(payload) => std::panic::resume_unwind(payload),
            };
            report.record("tx-1 acquire_write(B)", granted.to_string());
            Ok(())
        })?;

        manager.release_write(&b, &t1)?;
        manager.release_write(&a, &t1)?;
        report.record("tx-1 release_write(A, B)", "ok");

        report.deadlocks_detected = manager.detected_deadlock_count();
        Ok(report)
    }
}
