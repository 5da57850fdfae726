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

//! File system store backend.
//!
//! Layout of the store directory:
//!
//!   - `associations/<url hash>.<handle hash>`: one JSON document per
//!     association.
//!   - `nonces/<url hash>.<timestamp>.<salt>`: one empty file per used nonce.
//!   - `temp/`: scratch space for the association documents before they are
//!     renamed into place. The sweep removes only files older than
//!     [TEMP_FILE_GRACE], writes still in flight in other processes are left
//!     alone.
//!
//! Hashes are the URL safe base64 of the SHA-256 digest so that arbitrary
//! server urls and handles map to file names of a fixed length. Association
//! documents are written into `temp/` first and renamed, readers therefore
//! never observe a partially written record. Nonce files are created with
//! `O_EXCL`, which keeps the nonce check atomic also between processes
//! sharing the directory.
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::StoreBackend;
use crate::association::{Association, AssociationDataError};
use crate::store::StoreProviderError;
use crate::store::backend::error::StoreFileError;

const ASSOCIATIONS_DIR: &str = "associations";
const NONCES_DIR: &str = "nonces";
const TEMP_DIR: &str = "temp";

/// Age after which a scratch file is considered abandoned.
pub const TEMP_FILE_GRACE: Duration = Duration::from_secs(3600);

#[derive(Clone, Debug)]
pub struct FileBackend {
    /// Association documents.
    association_dir: PathBuf,
    /// Nonce markers.
    nonce_dir: PathBuf,
    /// Scratch directory on the same file system.
    temp_dir: PathBuf,
    /// Serializes the modifications done by this process.
    lock: Arc<Mutex<()>>,
}

/// On-disk representation of the association.
#[derive(Debug, Deserialize, Serialize)]
struct AssociationRecord {
    server_url: String,
    handle: String,
    /// Standard base64 of the secret.
    secret: String,
    issued: i64,
    lifetime: i64,
    assoc_type: String,
}

impl AssociationRecord {
    fn new(server_url: &str, association: &Association) -> Self {
        Self {
            server_url: server_url.to_string(),
            handle: association.handle.clone(),
            secret: STANDARD.encode(association.secret()),
            issued: association.issued.timestamp(),
            lifetime: association.lifetime,
            assoc_type: association.assoc_type.clone(),
        }
    }

    fn into_association(self, path: &Path) -> Result<Association, StoreFileError> {
        let secret = STANDARD
            .decode(&self.secret)
            .map_err(|_| StoreFileError::Serde {
                source: serde::de::Error::custom("secret is not base64"),
                path: path.to_path_buf(),
            })?;
        let invalid = |source| StoreFileError::Association {
            source,
            path: path.to_path_buf(),
        };
        let issued = DateTime::from_timestamp(self.issued, 0)
            .ok_or(AssociationDataError::InvalidIssued(self.issued))
            .map_err(invalid)?;
        Association::new(self.handle, secret, issued, self.lifetime, self.assoc_type)
            .map_err(invalid)
    }
}

fn safe_hash(value: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(value.as_bytes()))
}

impl FileBackend {
    /// Open the store in the directory, creating the layout when missing.
    pub fn new<P: Into<PathBuf>>(directory: P) -> Result<Self, StoreFileError> {
        let directory = directory.into();
        let backend = Self {
            association_dir: directory.join(ASSOCIATIONS_DIR),
            nonce_dir: directory.join(NONCES_DIR),
            temp_dir: directory.join(TEMP_DIR),
            lock: Arc::new(Mutex::new(())),
        };
        for dir in [
            &backend.association_dir,
            &backend.nonce_dir,
            &backend.temp_dir,
        ] {
            std::fs::create_dir_all(dir).map_err(StoreFileError::io(dir))?;
        }
        Ok(backend)
    }

    fn association_path(&self, server_url: &str, handle: &str) -> PathBuf {
        self.association_dir
            .join(format!("{}.{}", safe_hash(server_url), safe_hash(handle)))
    }

    /// Read the association document. `None` when the file is absent.
    async fn read_association(
        &self,
        path: &Path,
    ) -> Result<Option<Association>, StoreFileError> {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreFileError::io(path)(err)),
        };
        let record: AssociationRecord =
            serde_json::from_slice(&data).map_err(|source| StoreFileError::Serde {
                source,
                path: path.to_path_buf(),
            })?;
        Ok(Some(record.into_association(path)?))
    }

    /// Remove the file. Returns whether it existed.
    async fn remove_file(path: &Path) -> Result<bool, StoreFileError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StoreFileError::io(path)(err)),
        }
    }

    /// Whether the scratch file was last modified more than
    /// [TEMP_FILE_GRACE] ago.
    async fn is_abandoned(path: &Path) -> Result<bool, StoreFileError> {
        let modified = match fs::metadata(path).await {
            Ok(meta) => meta.modified().map_err(StoreFileError::io(path))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(StoreFileError::io(path)(err)),
        };
        Ok(SystemTime::now()
            .duration_since(modified)
            .is_ok_and(|age| age > TEMP_FILE_GRACE))
    }

    /// List files of the directory whose name starts with the prefix.
    async fn list_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>, StoreFileError> {
        let mut result = Vec::new();
        let mut entries = fs::read_dir(dir).await.map_err(StoreFileError::io(dir))?;
        while let Some(entry) = entries.next_entry().await.map_err(StoreFileError::io(dir))? {
            if let Ok(fname) = entry.file_name().into_string()
                && fname.starts_with(prefix)
            {
                result.push(entry.path());
            }
        }
        Ok(result)
    }
}

#[async_trait]
impl StoreBackend for FileBackend {
    async fn store_association(
        &self,
        server_url: &str,
        association: &Association,
    ) -> Result<(), StoreProviderError> {
        let target = self.association_path(server_url, &association.handle);
        let data = serde_json::to_vec(&AssociationRecord::new(server_url, association)).map_err(
            |source| StoreFileError::Serde {
                source,
                path: target.clone(),
            },
        )?;
        let temp_dir = self.temp_dir.clone();
        let _guard = self.lock.lock().await;
        tokio::task::spawn_blocking(move || -> Result<(), StoreFileError> {
            let mut tmp = tempfile::NamedTempFile::new_in(&temp_dir)
                .map_err(StoreFileError::io(&temp_dir))?;
            tmp.write_all(&data)
                .and_then(|_| tmp.as_file().sync_all())
                .map_err(StoreFileError::io(tmp.path()))?;
            tmp.persist(&target)?;
            Ok(())
        })
        .await
        .map_err(StoreFileError::from)??;
        Ok(())
    }

    async fn get_association<'a>(
        &self,
        server_url: &'a str,
        handle: &'a str,
        now: DateTime<Utc>,
    ) -> Result<Option<Association>, StoreProviderError> {
        let path = self.association_path(server_url, handle);
        let _guard = self.lock.lock().await;
        match self.read_association(&path).await? {
            Some(assoc) if assoc.is_expired(now) => {
                debug!("Removing expired association {}", assoc.handle);
                Self::remove_file(&path).await?;
                Ok(None)
            }
            Some(assoc) => Ok(Some(assoc)),
            None => Ok(None),
        }
    }

    async fn get_latest_association<'a>(
        &self,
        server_url: &'a str,
        now: DateTime<Utc>,
    ) -> Result<Option<Association>, StoreProviderError> {
        let prefix = format!("{}.", safe_hash(server_url));
        let _guard = self.lock.lock().await;
        let mut latest: Option<Association> = None;
        for path in Self::list_files(&self.association_dir, &prefix).await? {
            let Some(assoc) = self.read_association(&path).await? else {
                continue;
            };
            if assoc.is_expired(now) {
                debug!("Removing expired association {}", assoc.handle);
                Self::remove_file(&path).await?;
                continue;
            }
            if latest
                .as_ref()
                .is_none_or(|cur| (assoc.issued, &assoc.handle) > (cur.issued, &cur.handle))
            {
                latest = Some(assoc);
            }
        }
        Ok(latest)
    }

    async fn remove_association<'a>(
        &self,
        server_url: &'a str,
        handle: &'a str,
    ) -> Result<bool, StoreProviderError> {
        let path = self.association_path(server_url, handle);
        let _guard = self.lock.lock().await;
        Ok(Self::remove_file(&path).await?)
    }

    async fn cleanup_associations(&self, now: DateTime<Utc>) -> Result<u64, StoreProviderError> {
        let _guard = self.lock.lock().await;
        let mut count = 0;
        for path in Self::list_files(&self.association_dir, "").await? {
            match self.read_association(&path).await {
                Ok(Some(assoc)) if assoc.expires_at() < now => {
                    if Self::remove_file(&path).await? {
                        count += 1;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("Removing unreadable association file: {}", err);
                    Self::remove_file(&path).await?;
                }
            }
        }
        // Leftovers of interrupted writes.
        for path in Self::list_files(&self.temp_dir, "").await? {
            if Self::is_abandoned(&path).await? {
                debug!("Removing abandoned scratch file {}", path.display());
                Self::remove_file(&path).await?;
            }
        }
        Ok(count)
    }

    async fn use_nonce<'a>(
        &self,
        server_url: &'a str,
        timestamp: i64,
        salt: &'a str,
    ) -> Result<bool, StoreProviderError> {
        let path = self.nonce_dir.join(format!(
            "{}.{}.{}",
            safe_hash(server_url),
            timestamp,
            URL_SAFE_NO_PAD.encode(salt.as_bytes())
        ));
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(StoreFileError::io(&path)(err).into()),
        }
    }

    async fn cleanup_nonces(&self, cutoff: i64) -> Result<u64, StoreProviderError> {
        let _guard = self.lock.lock().await;
        let mut count = 0;
        for path in Self::list_files(&self.nonce_dir, "").await? {
            let timestamp = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.split('.').nth(1))
                .and_then(|ts| ts.parse::<i64>().ok());
            match timestamp {
                Some(ts) if ts >= cutoff => {}
                Some(_) => {
                    if Self::remove_file(&path).await? {
                        count += 1;
                    }
                }
                None => {
                    warn!("Removing unexpected file {:?} from the nonce store", path);
                    Self::remove_file(&path).await?;
                }
            }
        }
        Ok(count)
    }
}
