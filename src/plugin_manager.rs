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

//! Registry of externally provided backends.
use std::collections::HashMap;
use std::sync::Arc;

use crate::store::backend::StoreBackend;

#[derive(Clone, Default)]
pub struct PluginManager {
    /// Association and nonce store backend plugins.
    store_backends: HashMap<String, Arc<dyn StoreBackend>>,
}

impl PluginManager {
    /// Register store backend.
    pub fn register_store_backend<S: AsRef<str>>(
        &mut self,
        name: S,
        plugin: Arc<dyn StoreBackend>,
    ) {
        self.store_backends
            .insert(name.as_ref().to_string(), plugin);
    }

    /// Get registered store backend.
    pub fn get_store_backend<S: AsRef<str>>(&self, name: S) -> Option<&Arc<dyn StoreBackend>> {
        self.store_backends.get(name.as_ref())
    }
}
