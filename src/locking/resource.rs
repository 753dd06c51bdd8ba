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

//! Resource identities accepted by the lock table.

use std::fmt;
use std::hash::Hash;

/// A logical object that can be locked.
///
/// Identity is plain `Eq + Hash`; the lock table never inspects a resource
/// beyond that and [`LockResource::is_legal`], which rejects the "null"
/// sentinel of a resource type (an empty name, `None`).
pub trait LockResource: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {
    fn is_legal(&self) -> bool {
        true
    }
}

impl LockResource for String {
    fn is_legal(&self) -> bool {
        !self.is_empty()
    }
}

impl LockResource for &'static str {
    fn is_legal(&self) -> bool {
        !self.is_empty()
    }
}

impl<T: LockResource> LockResource for Option<T> {
    fn is_legal(&self) -> bool {
        matches!(self, Some(inner) if inner.is_legal())
    }
}

macro_rules! always_legal {
    ($($ty:ty),* $(,)?) => {
        $(impl LockResource for $ty {})*
    };
}

always_legal!(u16, u32, u64, u128, usize, i32, i64);

/// Resource key for graph-shaped stores: entities by id plus named resources
/// such as schema objects.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKey {
    Node(u64),
    Relationship(u64),
    Named(String),
}

impl ResourceKey {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl LockResource for ResourceKey {
    fn is_legal(&self) -> bool {
        match self {
            ResourceKey::Node(_) | ResourceKey::Relationship(_) => true,
            ResourceKey::Named(name) => !name.trim().is_empty(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::Node(id) => write!(f, "node({id})"),
            ResourceKey::Relationship(id) => write!(f, "relationship({id})"),
            ResourceKey::Named(name) => write!(f, "{name}"),
        }
    }
}

// Lock dumps and errors render resources through `Debug`.
impl fmt::Debug for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
