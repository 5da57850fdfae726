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
//
// SPDX-License-Identifier: Apache-2.0

//! # Time source
//!
//! Expiry of associations and the nonce skew window are evaluated against
//! the [Clock] handed to the component at construction.
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;

    /// Current time as the unix timestamp (seconds).
    fn timestamp(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock.
///
/// Clones share the same instant, so a test can hand one copy to a store
/// and move the time forward through another.
#[derive(Clone, Debug, Default)]
pub struct FixedClock {
    now: Arc<AtomicI64>,
}

impl FixedClock {
    /// Clock frozen at the given unix timestamp.
    pub fn new(timestamp: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(timestamp)),
        }
    }

    /// Move the clock to the given unix timestamp.
    pub fn set(&self, timestamp: i64) {
        self.now.store(timestamp, Ordering::SeqCst);
    }

    /// Move the clock by the given amount of seconds.
    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.now.load(Ordering::SeqCst), 0).unwrap_or_default()
    }

    fn timestamp(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Default clock for the components.
pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}
