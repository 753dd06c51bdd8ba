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

use crate::config::SimulationConfig;
use crate::locking::{LockMode, ResourceKey};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// One lock request of a simulated transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockStep {
    pub resource: ResourceKey,
    pub mode: LockMode,
}

/// Produces random lock sequences over `resources` node keys.
///
/// Steps are drawn independently, so a plan may revisit a resource (a
/// re-entrant acquire) and two plans may take shared resources in opposite
/// orders, which is what provokes deadlocks.
pub struct PlanGenerator {
    rng: StdRng,
    resources: u64,
    locks_per_transaction: usize,
    write_ratio: f64,
}

impl PlanGenerator {
    pub fn new(seed: u64, config: &SimulationConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            resources: config.resources.max(1) as u64,
            locks_per_transaction: config.locks_per_transaction,
            write_ratio: config.write_ratio.clamp(0.0, 1.0),
        }
    }

    pub fn next_plan(&mut self) -> Vec<LockStep> {
        (0..self.locks_per_transaction)
            .map(|_| {
                let resource = ResourceKey::Node(self.rng.gen_range(0..self.resources));
                let mode = if self.rng.gen_bool(self.write_ratio) {
                    LockMode::Write
                } else {
                    LockMode::Read
                };
                LockStep { resource, mode }
            })
            .collect()
    }
}
