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

//! Store fixtures shared by the integration tests.
use std::sync::Arc;

use chrono::DateTime;
use eyre::{OptionExt, Result};
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use tempfile::TempDir;

use openid_consumer::Association;
use openid_consumer::common::clock::FixedClock;
use openid_consumer::config::Config;
use openid_consumer::db_migration::Migrator;
use openid_consumer::plugin_manager::PluginManager;
use openid_consumer::store::StoreProvider;

/// Store under test together with the resources that must outlive it.
pub struct Fixture {
    pub store: StoreProvider,
    pub clock: FixedClock,
    _dir: Option<TempDir>,
}

fn config(driver: &str) -> Config {
    let mut config = Config::default();
    config.store.driver = driver.into();
    config.store.nonce_skew = 300;
    config
}

pub async fn memory(now: i64) -> Result<Fixture> {
    let clock = FixedClock::new(now);
    let store = StoreProvider::new(&config("memory"), &PluginManager::default(), None)?
        .with_clock(Arc::new(clock.clone()));
    Ok(Fixture {
        store,
        clock,
        _dir: None,
    })
}

pub async fn file(now: i64) -> Result<Fixture> {
    let dir = tempfile::tempdir()?;
    let mut config = config("file");
    config.store.directory = Some(dir.path().to_path_buf());
    let clock = FixedClock::new(now);
    let store = StoreProvider::new(&config, &PluginManager::default(), None)?
        .with_clock(Arc::new(clock.clone()));
    Ok(Fixture {
        store,
        clock,
        _dir: Some(dir),
    })
}

pub async fn sql(now: i64) -> Result<Fixture> {
    // A single connection keeps the in-memory database alive and shared.
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opts).await?;
    Migrator::up(&db, None).await?;
    let clock = FixedClock::new(now);
    let store = StoreProvider::new(&config("sql"), &PluginManager::default(), Some(db))?
        .with_clock(Arc::new(clock.clone()));
    Ok(Fixture {
        store,
        clock,
        _dir: None,
    })
}

/// HMAC-SHA1 association issued at `issued`.
pub fn association(handle: &str, issued: i64, lifetime: i64) -> Result<Association> {
    Ok(Association::new(
        handle,
        vec![0xab; 20],
        DateTime::from_timestamp(issued, 0).ok_or_eyre("timestamp out of range")?,
        lifetime,
        "HMAC-SHA1",
    )?)
}
