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

//! # Configuration
//!
//! The configuration is read from the INI file. Every component receives the
//! section it needs at construction time; nothing reads the configuration
//! from a global state.
use config::{File, FileFormat};
use eyre::{Report, WrapErr};
use serde::Deserialize;
use std::path::PathBuf;

mod association;
mod common;
mod database;
mod store;

pub use association::AssociationSection;
pub use common::csv;
pub use database::DatabaseSection;
pub use store::StoreSection;

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    /// Association negotiation.
    #[serde(default)]
    pub association: AssociationSection,

    /// Database configuration. Only used by the `sql` store driver.
    #[serde(default)]
    pub database: DatabaseSection,

    /// Association and nonce store.
    #[serde(default)]
    pub store: StoreSection,
}

impl Config {
    pub fn new(path: PathBuf) -> Result<Self, Report> {
        let mut builder = config::Config::builder();

        if std::path::Path::new(&path).is_file() {
            builder = builder.add_source(File::from(path).format(FileFormat::Ini));
        }

        builder.try_into()
    }
}

impl TryFrom<config::ConfigBuilder<config::builder::DefaultState>> for Config {
    type Error = Report;
    fn try_from(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, Self::Error> {
        let mut builder = builder;
        builder = builder
            .set_default("association.timeout", "30")?
            .set_default("store.driver", "sql")?
            .set_default("store.nonce_skew", "300")?
            .set_default("store.cleanup_interval", "3600")?;

        builder
            .build()
            .wrap_err("Failed to read configuration file")?
            .try_deserialize()
            .wrap_err("Failed to parse configuration file")
    }
}
