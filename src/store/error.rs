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

use thiserror::Error;

use crate::error::DatabaseError;
use crate::store::backend::error::{StoreDatabaseError, StoreFileError};

#[derive(Error, Debug)]
pub enum StoreProviderError {
    /// SQL backend error.
    #[error(transparent)]
    Backend {
        /// The source of the error.
        source: StoreDatabaseError,
    },

    /// Conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    /// File backend error.
    #[error(transparent)]
    File {
        /// The source of the error.
        #[from]
        source: StoreFileError,
    },

    /// The `file` driver needs the directory.
    #[error("store.directory must be set for the file driver")]
    MissingDirectory,

    /// The `sql` driver needs the database connection.
    #[error("database connection is required for the sql driver")]
    MissingDatabase,

    /// Unsupported driver.
    #[error("unsupported driver {0}")]
    UnsupportedDriver(String),
}

impl From<StoreDatabaseError> for StoreProviderError {
    fn from(source: StoreDatabaseError) -> Self {
        match source {
            StoreDatabaseError::Database { source } => match source {
                cfl @ DatabaseError::Conflict { .. } => Self::Conflict(cfl.to_string()),
                other => Self::Backend {
                    source: StoreDatabaseError::Database { source: other },
                },
            },
            other => Self::Backend { source: other },
        }
    }
}

impl From<DatabaseError> for StoreProviderError {
    fn from(source: DatabaseError) -> Self {
        StoreDatabaseError::from(source).into()
    }
}
