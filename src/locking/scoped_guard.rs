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

use crate::error::Result;
use crate::locking::manager::LockManager;
use crate::locking::mode::LockMode;
use crate::locking::owner::LockOwner;
use crate::locking::resource::LockResource;
use log::warn;

/// Releases one acquired count when dropped.
pub struct LockGuard<'a, R: LockResource, T: LockOwner> {
    manager: &'a LockManager<R, T>,
    held: Option<(R, T)>,
    mode: LockMode,
}

impl<'a, R: LockResource, T: LockOwner> LockGuard<'a, R, T> {
    pub(crate) fn new(manager: &'a LockManager<R, T>, resource: R, tx: T, mode: LockMode) -> Self {
        Self {
            manager,
            held: Some((resource, tx)),
            mode,
        }
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    pub fn resource(&self) -> Option<&R> {
        self.held.as_ref().map(|(resource, _)| resource)
    }

    pub fn release(mut self) -> Result<()> {
        if let Some((resource, tx)) = self.held.take() {
            self.manager.release(&resource, &tx, self.mode)
        } else {
            Ok(())
        }
    }
}

impl<R: LockResource, T: LockOwner> Drop for LockGuard<'_, R, T> {
    fn drop(&mut self) {
        if let Some((resource, tx)) = self.held.take()
            && let Err(err) = self.manager.release(&resource, &tx, self.mode)
        {
            warn!("Failed to release {} lock on {resource:?} for {tx:?}: {err}", self.mode);
        }
    }
}
