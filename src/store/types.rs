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

//! Store contract.
use async_trait::async_trait;

use crate::association::Association;
use crate::store::error::StoreProviderError;

/// Single-use nonce registry.
#[async_trait]
pub trait NonceTracker: Send + Sync {
    /// Consume the `(server_url, timestamp, salt)` triple.
    ///
    /// Returns `true` when the triple was not seen before and the timestamp is
    /// within the allowed skew from the current time. Any other outcome is
    /// `false`: the nonce must not be accepted.
    async fn use_nonce(
        &self,
        server_url: &str,
        timestamp: i64,
        salt: &str,
    ) -> Result<bool, StoreProviderError>;

    /// Forget nonces older than the allowed skew. Returns the number of the
    /// removed records.
    async fn cleanup_nonces(&self) -> Result<u64, StoreProviderError>;
}

/// Association store.
#[async_trait]
pub trait AssociationStore: NonceTracker {
    /// Insert or replace the association identified by `(server_url,
    /// association.handle)`.
    async fn store_association(
        &self,
        server_url: &str,
        association: &Association,
    ) -> Result<(), StoreProviderError>;

    /// Get the association.
    ///
    /// Without the handle the live association with the latest `issued`
    /// time is returned. Expired associations found during the lookup are
    /// removed and never returned.
    async fn get_association(
        &self,
        server_url: &str,
        handle: Option<&str>,
    ) -> Result<Option<Association>, StoreProviderError>;

    /// Remove the association. Returns whether it was present.
    async fn remove_association(
        &self,
        server_url: &str,
        handle: &str,
    ) -> Result<bool, StoreProviderError>;

    /// Remove every expired association. Returns the number of the removed
    /// records.
    async fn cleanup_associations(&self) -> Result<u64, StoreProviderError>;

    /// Sweep both the nonces and the associations.
    async fn cleanup(&self) -> Result<(u64, u64), StoreProviderError> {
        Ok((self.cleanup_nonces().await?, self.cleanup_associations().await?))
    }
}
