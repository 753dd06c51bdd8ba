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

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use txlock::commands::effective_locking;
use txlock::commands::scenario::ScenarioCommand;
use txlock::commands::simulate::{SimulateArgs, SimulateCommand};
use txlock::config::TxlockConfig;
use txlock::error::{Result, format_error_chain, get_exit_code};
use txlock::logging;

const CONFIG_DIR_ENV: &str = "TXLOCK_CONFIG_DIR";

#[derive(Parser)]
#[command(name = "txlock")]
#[command(author, version, about = "Resource lock manager with deadlock prevention", long_about = None)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory containing txlock.toml
    #[arg(long, value_name = "DIR", global = true)]
    config: Option<PathBuf>,

    /// How often parked waiters re-check for termination, in milliseconds
    #[arg(long, value_name = "MS", global = true)]
    poll_ms: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scripted locking scenarios and print lock dumps
    Scenario {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Run a random multi-threaded workload and summarize it
    #[command(visible_alias = "sim")]
    Simulate(SimulateArgs),
}

fn load_config(cli: &Cli) -> Result<TxlockConfig> {
    let dir = cli
        .config
        .clone()
        .or_else(|| std::env::var_os(CONFIG_DIR_ENV).map(PathBuf::from));
    match dir {
        Some(dir) => TxlockConfig::load(&dir),
        None => Ok(TxlockConfig::default()),
    }
}

fn main() {
    let cli = Cli::parse();

    logging::setup_logger(cli.verbose);

    let result: Result<()> = (|| {
        let config = load_config(&cli)?;
        let locking = effective_locking(&config, cli.poll_ms.as_deref())?;

        match &cli.command {
            Commands::Scenario { json } => {
                let command = ScenarioCommand::new(&locking)?;
                command.execute(*json)
            }
            Commands::Simulate(args) => {
                let command = SimulateCommand::new(args.apply(&config.simulation), &locking)?;
                command.execute(args.json)
            }
        }
    })();

    if let Err(e) = result {
        eprintln!("{}", format_error_chain(&e));
        std::process::exit(get_exit_code(&e));
    }
}
