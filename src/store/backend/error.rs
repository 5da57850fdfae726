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

use std::path::PathBuf;

use thiserror::Error;

use crate::association::AssociationDataError;
use crate::error::DatabaseError;

/// SQL backend error.
#[derive(Error, Debug)]
pub enum StoreDatabaseError {
    /// Stored record does not make a valid association.
    #[error("invalid association record: {source}")]
    Association {
        /// The source of the error.
        #[from]
        source: AssociationDataError,
    },

    /// Database error.
    #[error(transparent)]
    Database {
        /// The source of the error.
        #[from]
        source: DatabaseError,
    },
}

/// File backend error.
#[derive(Error, Debug)]
pub enum StoreFileError {
    /// Stored record does not make a valid association.
    #[error("invalid association record {path}: {source}")]
    Association {
        /// The source of the error.
        source: AssociationDataError,
        /// Record file.
        path: PathBuf,
    },

    /// IO error.
    #[error("io error on {path}: {source}")]
    Io {
        /// The source of the error.
        source: std::io::Error,
        /// File or directory being accessed.
        path: PathBuf,
    },

    /// Temporary file can not be moved in place.
    #[error(transparent)]
    Persist {
        /// The source of the error.
        #[from]
        source: tempfile::PersistError,
    },

    /// (De)Ser error.
    #[error("corrupted association record {path}: {source}")]
    Serde {
        /// The source of the error.
        source: serde_json::Error,
        /// Record file.
        path: PathBuf,
    },

    /// Blocking task failed.
    #[error("file store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl StoreFileError {
    pub(crate) fn io<P: Into<PathBuf>>(path: P) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { source, path }
    }
}
