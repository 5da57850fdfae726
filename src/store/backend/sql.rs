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

//! Relational store backend.
//!
//! Every operation runs in its own transaction. The transaction is rolled
//! back when the operation fails (or is dropped before the commit), so a
//! partially applied operation is never visible.
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};

use super::StoreBackend;
use crate::association::{Association, AssociationDataError};
use crate::db::entity::oid_association as db_association;
use crate::error::DbContextExt;
use crate::store::StoreProviderError;
use crate::store::backend::error::StoreDatabaseError;

mod association;
mod nonce;

#[derive(Clone, Debug)]
pub struct SqlBackend {
    db: Arc<DatabaseConnection>,
}

impl SqlBackend {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db: Arc::new(db) }
    }

    async fn begin(&self) -> Result<DatabaseTransaction, StoreDatabaseError> {
        Ok(self.db.begin().await.context("starting the transaction")?)
    }
}

async fn commit(txn: DatabaseTransaction) -> Result<(), StoreDatabaseError> {
    Ok(txn.commit().await.context("committing the transaction")?)
}

impl TryFrom<db_association::Model> for Association {
    type Error = StoreDatabaseError;
    fn try_from(value: db_association::Model) -> Result<Self, Self::Error> {
        let issued = DateTime::from_timestamp(value.issued, 0)
            .ok_or(AssociationDataError::InvalidIssued(value.issued))?;
        Ok(Association::new(
            value.handle,
            value.secret,
            issued,
            value.lifetime,
            value.assoc_type,
        )?)
    }
}

#[async_trait]
impl StoreBackend for SqlBackend {
    async fn store_association(
        &self,
        server_url: &str,
        association: &Association,
    ) -> Result<(), StoreProviderError> {
        let txn = self.begin().await?;
        association::upsert::upsert(&txn, server_url, association).await?;
        commit(txn).await?;
        Ok(())
    }

    async fn get_association<'a>(
        &self,
        server_url: &'a str,
        handle: &'a str,
        now: DateTime<Utc>,
    ) -> Result<Option<Association>, StoreProviderError> {
        let txn = self.begin().await?;
        let result = match association::get::get(&txn, server_url, handle).await? {
            Some(entry) => {
                let assoc = Association::try_from(entry)?;
                if assoc.is_expired(now) {
                    association::delete::delete_expired(&txn, server_url, handle, now).await?;
                    None
                } else {
                    Some(assoc)
                }
            }
            None => None,
        };
        commit(txn).await?;
        Ok(result)
    }

    async fn get_latest_association<'a>(
        &self,
        server_url: &'a str,
        now: DateTime<Utc>,
    ) -> Result<Option<Association>, StoreProviderError> {
        let txn = self.begin().await?;
        let mut latest: Option<Association> = None;
        // Ordered by `issued` (and the handle) descending, the first live
        // entry wins.
        for entry in association::get::list(&txn, server_url).await? {
            let assoc = Association::try_from(entry)?;
            if assoc.is_expired(now) {
                association::delete::delete_expired(&txn, server_url, &assoc.handle, now)
                    .await?;
            } else if latest.is_none() {
                latest = Some(assoc);
            }
        }
        commit(txn).await?;
        Ok(latest)
    }

    async fn remove_association<'a>(
        &self,
        server_url: &'a str,
        handle: &'a str,
    ) -> Result<bool, StoreProviderError> {
        let txn = self.begin().await?;
        let count = association::delete::delete(&txn, server_url, handle).await?;
        commit(txn).await?;
        Ok(count > 0)
    }

    async fn cleanup_associations(&self, now: DateTime<Utc>) -> Result<u64, StoreProviderError> {
        let txn = self.begin().await?;
        let count = association::cleanup::cleanup(&txn, now).await?;
        commit(txn).await?;
        Ok(count)
    }

    async fn use_nonce<'a>(
        &self,
        server_url: &'a str,
        timestamp: i64,
        salt: &'a str,
    ) -> Result<bool, StoreProviderError> {
        let txn = self.begin().await?;
        match nonce::create::create(&txn, server_url, timestamp, salt).await {
            Ok(()) => {
                commit(txn).await?;
                Ok(true)
            }
            Err(StoreDatabaseError::Database { source }) if source.is_conflict() => {
                txn.rollback()
                    .await
                    .context("rolling back the transaction")?;
                Ok(false)
            }
            Err(other) => Err(other.into()),
        }
    }

    async fn cleanup_nonces(&self, cutoff: i64) -> Result<u64, StoreProviderError> {
        let txn = self.begin().await?;
        let count = nonce::cleanup::cleanup(&txn, cutoff).await?;
        commit(txn).await?;
        Ok(count)
    }
}
