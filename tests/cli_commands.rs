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

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use std::fs;
use tempfile::TempDir;

fn txlock() -> Command {
    let mut command = Command::cargo_bin("txlock").unwrap();
    command.env_remove("TXLOCK_CONFIG_DIR");
    command.env_remove("TXLOCK_TERMINATION_POLL_MS");
    command
}

#[test]
fn test_help_lists_subcommands_and_global_flags() {
    txlock()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("scenario"))
        .stdout(contains("simulate"))
        .stdout(contains("--config"))
        .stdout(contains("--poll-ms"));
}

#[test]
fn test_scenario_prints_dumps() {
    txlock()
        .args(["scenario", "--poll-ms", "5"])
        .assert()
        .success()
        .stdout(contains("Scenario: basic"))
        .stdout(contains("Locks on R:"))
        .stdout(contains("tx-1 (read=0, write=1)"))
        .stdout(contains("Deadlock detected"));
}

#[test]
fn test_scenario_json_is_parseable() {
    let output = txlock().args(["scenario", "--json"]).output().unwrap();
    assert!(output.status.success());

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let reports = reports.as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["name"], "basic");
    assert_eq!(reports[1]["deadlocks_detected"], 1);
}

#[test]
fn test_simulate_json_report() {
    let output = txlock()
        .args([
            "simulate", "--workers", "3", "--resources", "4", "--transactions", "20", "--seed",
            "17", "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["seed"], 17);
    assert_eq!(report["planned"], 60);
    assert_eq!(report["leftover_resources"], 0);
}

#[test]
fn test_simulate_table_summary() {
    txlock()
        .args(["sim", "-w", "2", "-r", "8", "-t", "10", "--write-ratio", "0"])
        .assert()
        .success()
        .stdout(contains("Transactions planned"))
        .stdout(contains("Deadlocks detected"))
        .stdout(contains("All transactions committed"));
}

#[test]
fn test_config_directory_is_honoured() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("txlock.toml"),
        "[simulation]\nworkers = 1\ntransactions_per_worker = 5\nseed = 3\n",
    )
    .unwrap();

    let output = txlock()
        .args(["simulate", "--json", "--config"])
        .arg(temp.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["workers"], 1);
    assert_eq!(report["planned"], 5);
    assert_eq!(report["seed"], 3);
}

#[test]
fn test_invalid_config_exits_with_config_code() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("txlock.toml"),
        "[simulation]\nwrite_ratio = 4.0\n",
    )
    .unwrap();

    txlock()
        .arg("scenario")
        .arg("--config")
        .arg(temp.path())
        .assert()
        .code(2)
        .stderr(contains("write_ratio"));
}

#[test]
fn test_invalid_poll_override_is_rejected() {
    txlock()
        .args(["scenario", "--poll-ms", "never"])
        .assert()
        .code(2)
        .stderr(contains("Invalid configuration").and(contains("never")));
}
