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

use serde::Deserialize;
use std::path::PathBuf;

use crate::config::common::default_sql_driver;
use crate::nonce::DEFAULT_SKEW;

/// Association and nonce store configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreSection {
    /// Store backend driver: `memory`, `file`, `sql` or the name of a backend
    /// registered in the plugin manager.
    #[serde(default = "default_sql_driver")]
    pub driver: String,

    /// Root directory of the `file` driver.
    pub directory: Option<PathBuf>,

    /// Maximal difference (in seconds) between the nonce timestamp and the
    /// current time.
    #[serde(default = "default_nonce_skew")]
    pub nonce_skew: i64,

    /// How often (in seconds) the expired records should be swept. The store
    /// does not schedule the sweep itself.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
}

fn default_nonce_skew() -> i64 {
    DEFAULT_SKEW
}

fn default_cleanup_interval() -> u64 {
    3600
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            driver: default_sql_driver(),
            directory: None,
            nonce_skew: default_nonce_skew(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}
