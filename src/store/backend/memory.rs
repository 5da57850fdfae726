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

//! In-process store backend.
//!
//! Records live only as long as the process. Clones share the same maps.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::StoreBackend;
use crate::association::Association;
use crate::store::StoreProviderError;

type ServerAssociations = HashMap<String, Association>;

#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    /// Associations by the server url and the handle.
    associations: Arc<Mutex<HashMap<String, ServerAssociations>>>,
    /// Used nonces.
    nonces: Arc<Mutex<HashSet<(String, i64, String)>>>,
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn store_association(
        &self,
        server_url: &str,
        association: &Association,
    ) -> Result<(), StoreProviderError> {
        self.associations
            .lock()
            .await
            .entry(server_url.to_string())
            .or_default()
            .insert(association.handle.clone(), association.clone());
        Ok(())
    }

    async fn get_association<'a>(
        &self,
        server_url: &'a str,
        handle: &'a str,
        now: DateTime<Utc>,
    ) -> Result<Option<Association>, StoreProviderError> {
        let mut guard = self.associations.lock().await;
        let Some(server) = guard.get_mut(server_url) else {
            return Ok(None);
        };
        match server.get(handle) {
            Some(assoc) if assoc.is_expired(now) => {
                server.remove(handle);
                Ok(None)
            }
            Some(assoc) => Ok(Some(assoc.clone())),
            None => Ok(None),
        }
    }

    async fn get_latest_association<'a>(
        &self,
        server_url: &'a str,
        now: DateTime<Utc>,
    ) -> Result<Option<Association>, StoreProviderError> {
        let mut guard = self.associations.lock().await;
        let Some(server) = guard.get_mut(server_url) else {
            return Ok(None);
        };
        server.retain(|_, assoc| !assoc.is_expired(now));
        Ok(server
            .values()
            .max_by(|a, b| (a.issued, &a.handle).cmp(&(b.issued, &b.handle)))
            .cloned())
    }

    async fn remove_association<'a>(
        &self,
        server_url: &'a str,
        handle: &'a str,
    ) -> Result<bool, StoreProviderError> {
        Ok(self
            .associations
            .lock()
            .await
            .get_mut(server_url)
            .and_then(|server| server.remove(handle))
            .is_some())
    }

    async fn cleanup_associations(&self, now: DateTime<Utc>) -> Result<u64, StoreProviderError> {
        let mut guard = self.associations.lock().await;
        let mut count = 0;
        for server in guard.values_mut() {
            let before = server.len();
            server.retain(|_, assoc| assoc.expires_at() >= now);
            count += before - server.len();
        }
        guard.retain(|_, server| !server.is_empty());
        Ok(count as u64)
    }

    async fn use_nonce<'a>(
        &self,
        server_url: &'a str,
        timestamp: i64,
        salt: &'a str,
    ) -> Result<bool, StoreProviderError> {
        Ok(self
            .nonces
            .lock()
            .await
            .insert((server_url.to_string(), timestamp, salt.to_string())))
    }

    async fn cleanup_nonces(&self, cutoff: i64) -> Result<u64, StoreProviderError> {
        let mut guard = self.nonces.lock().await;
        let before = guard.len();
        guard.retain(|(_, timestamp, _)| *timestamp >= cutoff);
        Ok((before - guard.len()) as u64)
    }
}
