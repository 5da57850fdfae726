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

//! # Association and nonce store
//!
//! The relying party keeps two kinds of records:
//!
//!   - associations: shared secrets established with the providers, keyed by
//!     `(server_url, handle)`. Inserting the same pair replaces the record.
//!
//!   - nonces: `(server_url, timestamp, salt)` triples of the positive
//!     assertions already accepted. A triple is accepted at most once and
//!     only while its timestamp is within the configured skew from the
//!     current time.
//!
//! Records are persisted by one of the backends selected with
//! `[store] driver`:
//!
//!   - `memory` ([backend::memory::MemoryBackend]): process local maps.
//!   - `file` ([backend::file::FileBackend]): one file per record under
//!     `[store] directory`.
//!   - `sql` ([backend::sql::SqlBackend]): `oid_associations` and `oid_nonces`
//!     tables (see [crate::db_migration]).
//!
//! Further backends can be registered in the [PluginManager] under a name and
//! selected with the same option.
//!
//! Expired records are only removed opportunistically during the lookup.
//! The periodic sweep (`cleanup_associations`, `cleanup_nonces`) is expected
//! to be invoked by the embedding application every `[store]
//! cleanup_interval` seconds.
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use secrecy::ExposeSecret;

pub mod backend;
pub mod error;
pub mod types;

use crate::association::Association;
use crate::common::clock::{Clock, system_clock};
use crate::config::Config;
use crate::error::DbContextExt;
use crate::nonce;
use crate::plugin_manager::PluginManager;
use crate::store::backend::{
    StoreBackend, file::FileBackend, memory::MemoryBackend, sql::SqlBackend,
};
use crate::store::error::StoreProviderError;

pub use types::{AssociationStore, NonceTracker};

/// Store provider.
#[derive(Clone, Debug)]
pub struct StoreProvider {
    /// Backend driver.
    backend_driver: Arc<dyn StoreBackend>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Allowed nonce clock skew (seconds).
    nonce_skew: i64,
}

impl StoreProvider {
    /// Construct the store using the configured driver.
    ///
    /// `db` is only used by the `sql` driver.
    pub fn new(
        config: &Config,
        plugin_manager: &PluginManager,
        db: Option<DatabaseConnection>,
    ) -> Result<Self, StoreProviderError> {
        let backend_driver: Arc<dyn StoreBackend> = if let Some(driver) =
            plugin_manager.get_store_backend(config.store.driver.clone())
        {
            driver.clone()
        } else {
            match config.store.driver.as_str() {
                "memory" => Arc::new(MemoryBackend::default()),
                "file" => Arc::new(FileBackend::new(
                    config
                        .store
                        .directory
                        .clone()
                        .ok_or(StoreProviderError::MissingDirectory)?,
                )?),
                "sql" => Arc::new(SqlBackend::new(
                    db.ok_or(StoreProviderError::MissingDatabase)?,
                )),
                _ => {
                    return Err(StoreProviderError::UnsupportedDriver(
                        config.store.driver.clone(),
                    ));
                }
            }
        };
        Ok(Self {
            backend_driver,
            clock: system_clock(),
            nonce_skew: config.store.nonce_skew,
        })
    }

    /// Construct the store opening the `[database] connection` when the
    /// configured driver is `sql`.
    pub async fn connect(
        config: &Config,
        plugin_manager: &PluginManager,
    ) -> Result<Self, StoreProviderError> {
        if config.store.driver != "sql"
            || plugin_manager
                .get_store_backend(config.store.driver.clone())
                .is_some()
        {
            return Self::new(config, plugin_manager, None);
        }
        let url = config.database.get_connection();
        if url.expose_secret().is_empty() {
            return Err(StoreProviderError::MissingDatabase);
        }
        let opt = ConnectOptions::new(url.expose_secret())
            // Prevent dumping the password in plaintext.
            .sqlx_logging(false)
            .to_owned();
        tracing::debug!("Establishing the database connection...");
        let db = Database::connect(opt)
            .await
            .context("connecting to the database")?;
        Self::new(config, plugin_manager, Some(db))
    }

    /// Use the given time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Allowed nonce clock skew (seconds).
    pub fn nonce_skew(&self) -> i64 {
        self.nonce_skew
    }
}

#[async_trait]
impl NonceTracker for StoreProvider {
    /// Consume the nonce.
    ///
    /// The skew is checked before touching the backend so that stale
    /// timestamps are rejected even on the first use.
    #[tracing::instrument(level = "debug", skip(self))]
    async fn use_nonce(
        &self,
        server_url: &str,
        timestamp: i64,
        salt: &str,
    ) -> Result<bool, StoreProviderError> {
        if !nonce::within_skew(timestamp, self.nonce_skew, self.clock.timestamp()) {
            tracing::info!("Nonce timestamp is outside of the allowed skew");
            return Ok(false);
        }
        let fresh = self
            .backend_driver
            .use_nonce(server_url, timestamp, salt)
            .await?;
        if !fresh {
            tracing::warn!("Nonce was already used for {}", server_url);
        }
        Ok(fresh)
    }

    #[tracing::instrument(level = "info", skip(self))]
    async fn cleanup_nonces(&self) -> Result<u64, StoreProviderError> {
        let cutoff = self.clock.timestamp().saturating_sub(self.nonce_skew);
        let count = self.backend_driver.cleanup_nonces(cutoff).await?;
        tracing::debug!("Removed {} expired nonces", count);
        Ok(count)
    }
}

#[async_trait]
impl AssociationStore for StoreProvider {
    #[tracing::instrument(level = "info", skip(self, association), fields(handle = %association.handle))]
    async fn store_association(
        &self,
        server_url: &str,
        association: &Association,
    ) -> Result<(), StoreProviderError> {
        self.backend_driver
            .store_association(server_url, association)
            .await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn get_association(
        &self,
        server_url: &str,
        handle: Option<&str>,
    ) -> Result<Option<Association>, StoreProviderError> {
        let now = self.clock.now();
        match handle {
            Some(handle) => {
                self.backend_driver
                    .get_association(server_url, handle, now)
                    .await
            }
            None => {
                self.backend_driver
                    .get_latest_association(server_url, now)
                    .await
            }
        }
    }

    #[tracing::instrument(level = "info", skip(self))]
    async fn remove_association(
        &self,
        server_url: &str,
        handle: &str,
    ) -> Result<bool, StoreProviderError> {
        self.backend_driver
            .remove_association(server_url, handle)
            .await
    }

    #[tracing::instrument(level = "info", skip(self))]
    async fn cleanup_associations(&self) -> Result<u64, StoreProviderError> {
        let count = self
            .backend_driver
            .cleanup_associations(self.clock.now())
            .await?;
        tracing::debug!("Removed {} expired associations", count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use mockall::predicate::eq;
    use tracing_test::traced_test;

    use super::*;
    use crate::common::clock::FixedClock;
    use crate::store::backend::MockStoreBackend;

    fn provider(backend: MockStoreBackend, now: i64) -> StoreProvider {
        let mut plugin_manager = PluginManager::default();
        plugin_manager.register_store_backend("mock", Arc::new(backend));
        let mut config = Config::default();
        config.store.driver = "mock".into();
        StoreProvider::new(&config, &plugin_manager, None)
            .unwrap()
            .with_clock(Arc::new(FixedClock::new(now)))
    }

    fn at(ts: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(ts, 0).unwrap()
    }

    #[test]
    fn test_unsupported_driver() {
        let mut config = Config::default();
        config.store.driver = "ldap".into();
        assert!(matches!(
            StoreProvider::new(&config, &PluginManager::default(), None),
            Err(StoreProviderError::UnsupportedDriver(x)) if x == "ldap"
        ));
        config.store.driver = "sql".into();
        assert!(matches!(
            StoreProvider::new(&config, &PluginManager::default(), None),
            Err(StoreProviderError::MissingDatabase)
        ));
        config.store.driver = "file".into();
        assert!(matches!(
            StoreProvider::new(&config, &PluginManager::default(), None),
            Err(StoreProviderError::MissingDirectory)
        ));
    }

    #[tokio::test]
    async fn test_connect() {
        let mut config = Config::default();
        config.store.driver = "sql".into();
        assert!(matches!(
            StoreProvider::connect(&config, &PluginManager::default()).await,
            Err(StoreProviderError::MissingDatabase)
        ));
        config.database.connection = Some("sqlite::memory:".into());
        assert!(
            StoreProvider::connect(&config, &PluginManager::default())
                .await
                .is_ok()
        );
        config.store.driver = "memory".into();
        config.database.connection = None;
        assert!(
            StoreProvider::connect(&config, &PluginManager::default())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn test_use_nonce_skew_checked_before_backend() {
        let mut backend = MockStoreBackend::default();
        backend.expect_use_nonce().never();
        let provider = provider(backend, 10_000);
        assert!(!provider.use_nonce("http://op/", 10_000 - 301, "salt").await.unwrap());
        assert!(!provider.use_nonce("http://op/", 10_000 + 301, "salt").await.unwrap());
        assert!(logs_contain("outside of the allowed skew"));
    }

    #[tokio::test]
    async fn test_use_nonce_delegates() {
        let mut backend = MockStoreBackend::default();
        backend
            .expect_use_nonce()
            .withf(|url: &str, ts: &i64, salt: &str| url == "http://op/" && *ts == 9_900 && salt == "abc")
            .times(1)
            .returning(|_, _, _| Ok(true));
        let provider = provider(backend, 10_000);
        assert!(provider.use_nonce("http://op/", 9_900, "abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_passes_cutoff_and_time() {
        let mut backend = MockStoreBackend::default();
        backend
            .expect_cleanup_nonces()
            .with(eq(10_000 - 300))
            .returning(|_| Ok(2));
        backend
            .expect_cleanup_associations()
            .with(eq(at(10_000)))
            .returning(|_| Ok(3));
        let provider = provider(backend, 10_000);
        assert_eq!((2, 3), provider.cleanup().await.unwrap());
    }

    #[tokio::test]
    async fn test_get_association_dispatch() {
        let mut backend = MockStoreBackend::default();
        backend
            .expect_get_association()
            .withf(|url: &str, handle: &str, now: &DateTime<Utc>| {
                url == "http://op/" && handle == "h1" && *now == at(500)
            })
            .returning(|_, _, _| Ok(None));
        backend
            .expect_get_latest_association()
            .withf(|url: &str, now: &DateTime<Utc>| url == "http://op/" && *now == at(500))
            .returning(|_, _| {
                Ok(Some(
                    Association::new("h2", vec![1; 20], at(400), 600, "HMAC-SHA1").unwrap(),
                ))
            });
        let provider = provider(backend, 500);
        assert!(
            provider
                .get_association("http://op/", Some("h1"))
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(
            "h2",
            provider
                .get_association("http://op/", None)
                .await
                .unwrap()
                .unwrap()
                .handle
        );
    }
}
