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

use crate::config::common::csv;

/// Association negotiation configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AssociationSection {
    /// Allowed `assoc_type:session_type` pairs in the order of preference.
    #[serde(deserialize_with = "csv", default = "default_allowed_types")]
    pub allowed_types: Vec<String>,

    /// Timeout (in seconds) of the association request to the provider.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "HMAC-SHA1:DH-SHA1".into(),
        "HMAC-SHA1:no-encryption".into(),
        "HMAC-SHA256:DH-SHA256".into(),
        "HMAC-SHA256:no-encryption".into(),
    ]
}

fn default_timeout() -> u64 {
    30
}

impl Default for AssociationSection {
    fn default() -> Self {
        Self {
            allowed_types: default_allowed_types(),
            timeout: default_timeout(),
        }
    }
}
