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

//! Store backends.
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod error;
pub mod file;
pub mod memory;
pub mod sql;

use crate::association::Association;
use crate::store::StoreProviderError;

/// Backend driver interface expected by the store provider.
///
/// The provider decides on the current time and the nonce skew, the backend
/// only persists. Every method must be safe to call concurrently with any
/// other.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreBackend: Send + Sync + std::fmt::Debug {
    /// Insert or replace the association.
    async fn store_association(
        &self,
        server_url: &str,
        association: &Association,
    ) -> Result<(), StoreProviderError>;

    /// Get the association by the handle.
    ///
    /// An association expired at `now` is removed and `None` is returned.
    async fn get_association<'a>(
        &self,
        server_url: &'a str,
        handle: &'a str,
        now: DateTime<Utc>,
    ) -> Result<Option<Association>, StoreProviderError>;

    /// Get the live association with the latest `issued` time.
    ///
    /// Expired associations of the server are removed on the way.
    async fn get_latest_association<'a>(
        &self,
        server_url: &'a str,
        now: DateTime<Utc>,
    ) -> Result<Option<Association>, StoreProviderError>;

    /// Remove the association, returns whether it was present.
    async fn remove_association<'a>(
        &self,
        server_url: &'a str,
        handle: &'a str,
    ) -> Result<bool, StoreProviderError>;

    /// Remove associations with `issued + lifetime < now`.
    async fn cleanup_associations(&self, now: DateTime<Utc>) -> Result<u64, StoreProviderError>;

    /// Record the nonce. Returns `false` when it was already recorded.
    async fn use_nonce<'a>(
        &self,
        server_url: &'a str,
        timestamp: i64,
        salt: &'a str,
    ) -> Result<bool, StoreProviderError>;

    /// Remove nonces with the timestamp before `cutoff`.
    async fn cleanup_nonces(&self, cutoff: i64) -> Result<u64, StoreProviderError>;
}
