use crate::config::{LockingConfig, SimulationConfig, TxlockConfig};
use crate::error::Result;
use crate::locking::global_token;
use crate::simulate::{Simulation, SimulationReport};
use clap::Args;
use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

/// Overrides for the `[simulation]` section of the configuration.
#[derive(Args, Debug, Default, Clone)]
pub struct SimulateArgs {
    /// Number of worker threads
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Number of distinct resources to lock
    #[arg(short, long)]
    pub resources: Option<usize>,

    /// Transactions each worker runs
    #[arg(short, long)]
    pub transactions: Option<usize>,

    /// Lock requests per transaction
    #[arg(short, long)]
    pub locks: Option<usize>,

    /// Fraction of requests that ask for write locks (0.0 - 1.0)
    #[arg(long)]
    pub write_ratio: Option<f64>,

    /// How long a transaction holds its locks, in microseconds
    #[arg(long, value_name = "MICROS")]
    pub hold: Option<u64>,

    /// Seed for a reproducible workload
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl SimulateArgs {
    pub fn apply(&self, config: &SimulationConfig) -> SimulationConfig {
        let mut merged = config.clone();
        if let Some(workers) = self.workers {
            merged.workers = workers;
        }
        if let Some(resources) = self.resources {
            merged.resources = resources;
        }
        if let Some(transactions) = self.transactions {
            merged.transactions_per_worker = transactions;
        }
        if let Some(locks) = self.locks {
            merged.locks_per_transaction = locks;
        }
        if let Some(write_ratio) = self.write_ratio {
            merged.write_ratio = write_ratio;
        }
        if let Some(hold) = self.hold {
            merged.hold_micros = hold;
        }
        if self.seed.is_some() {
            merged.seed = self.seed;
        }
        merged
    }
}

pub struct SimulateCommand<'a> {
    simulation: SimulationConfig,
    locking: &'a LockingConfig,
}

impl<'a> SimulateCommand<'a> {
    pub fn new(simulation: SimulationConfig, locking: &'a LockingConfig) -> Result<Self> {
        let checked = TxlockConfig {
            locking: locking.clone(),
            simulation: simulation.clone(),
        };
        checked.validate()?;
        Ok(Self {
            simulation,
            locking,
        })
    }

    pub fn execute(&self, json: bool) -> Result<()> {
        let report = Simulation::new(self.simulation.clone(), self.locking.clone())
            .with_cancellation(global_token())
            .run()?;

        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
        Ok(())
    }
}

fn print_report(report: &SimulationReport) {
    println!(
        "{} {} workers, {} resources, seed {}",
        "Simulation:".bold(),
        report.workers,
        report.resources,
        report.seed
    );

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_BORDERS_ONLY);
    table.set_header(vec![Cell::new("Metric"), Cell::new("Value")]);

    for (metric, value) in summary_rows(report) {
        table.add_row(vec![
            Cell::new(metric),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");

    if report.leftover_resources > 0 {
        println!(
            "{}",
            format!(
                "{} resources still locked after the run",
                report.leftover_resources
            )
            .red()
        );
    } else if report.gave_up > 0 || report.terminated > 0 {
        println!("{}", "Some transactions did not commit".yellow());
    } else {
        println!("{}", "All transactions committed".green());
    }
}

fn summary_rows(report: &SimulationReport) -> Vec<(&'static str, String)> {
    vec![
        ("Transactions planned", report.planned.to_string()),
        ("Committed", report.committed.to_string()),
        ("Deadlock aborts", report.deadlock_aborts.to_string()),
        ("Given up", report.gave_up.to_string()),
        ("Terminated", report.terminated.to_string()),
        ("Locks granted", report.locks_granted.to_string()),
        ("Waits", report.waits.to_string()),
        ("Deadlocks detected", report.deadlocks_detected.to_string()),
        ("Mean wait (µs)", report.mean_wait_micros.to_string()),
        ("Max wait (µs)", report.max_wait_micros.to_string()),
        ("Elapsed (ms)", report.elapsed_ms.to_string()),
    ]
}
