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

//! # Association
//!
//! Shared secret established with an OpenID provider. Associations are
//! immutable snapshots: the store replaces them as a whole and callers never
//! mutate a fetched record.
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretSlice};
use thiserror::Error;

/// Maximal length of the association secret.
pub const MAX_SECRET_LEN: usize = 128;

/// Maximal association lifetime in seconds.
pub const MAX_LIFETIME: i64 = i32::MAX as i64;

/// Association error.
#[derive(Debug, Error, PartialEq)]
pub enum AssociationDataError {
    /// Secret exceeds [MAX_SECRET_LEN].
    #[error("association secret is {0} bytes long, at most {MAX_SECRET_LEN} allowed")]
    SecretTooLong(usize),

    /// Negative lifetime.
    #[error("association lifetime must not be negative: {0}")]
    NegativeLifetime(i64),

    /// Lifetime exceeds [MAX_LIFETIME] or the expiry can not be represented.
    #[error("association lifetime {0} is out of range")]
    LifetimeOutOfRange(i64),

    /// Issue time can not be represented.
    #[error("association issue time {0} is out of range")]
    InvalidIssued(i64),

    /// Unknown association type.
    #[error("unknown association type {0}")]
    UnknownAssocType(String),
}

/// Signature algorithm the association secret is used with.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AssocType {
    HmacSha1,
    HmacSha256,
}

impl AssocType {
    /// All known association types in preference order.
    pub const ALL: [AssocType; 2] = [AssocType::HmacSha1, AssocType::HmacSha256];

    /// Protocol name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HmacSha1 => "HMAC-SHA1",
            Self::HmacSha256 => "HMAC-SHA256",
        }
    }

    /// Length of the MAC key in bytes.
    pub fn key_length(&self) -> usize {
        match self {
            Self::HmacSha1 => 20,
            Self::HmacSha256 => 32,
        }
    }
}

impl FromStr for AssocType {
    type Err = AssociationDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HMAC-SHA1" => Ok(Self::HmacSha1),
            "HMAC-SHA256" => Ok(Self::HmacSha256),
            other => Err(AssociationDataError::UnknownAssocType(other.to_string())),
        }
    }
}

impl fmt::Display for AssocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Association with an OpenID provider.
pub struct Association {
    /// Provider issued handle.
    pub handle: String,
    /// Shared MAC secret.
    secret: SecretSlice<u8>,
    /// Issue time.
    pub issued: DateTime<Utc>,
    /// Lifetime in seconds.
    pub lifetime: i64,
    /// Association type (`HMAC-SHA1`, `HMAC-SHA256`).
    pub assoc_type: String,
}

impl Association {
    /// Construct the association validating the secret length and the
    /// lifetime.
    pub fn new<H, T>(
        handle: H,
        secret: Vec<u8>,
        issued: DateTime<Utc>,
        lifetime: i64,
        assoc_type: T,
    ) -> Result<Self, AssociationDataError>
    where
        H: Into<String>,
        T: Into<String>,
    {
        if secret.len() > MAX_SECRET_LEN {
            return Err(AssociationDataError::SecretTooLong(secret.len()));
        }
        if lifetime < 0 {
            return Err(AssociationDataError::NegativeLifetime(lifetime));
        }
        if lifetime > MAX_LIFETIME
            || TimeDelta::try_seconds(lifetime)
                .and_then(|delta| issued.checked_add_signed(delta))
                .is_none()
        {
            return Err(AssociationDataError::LifetimeOutOfRange(lifetime));
        }
        Ok(Self {
            handle: handle.into(),
            secret: SecretSlice::from(secret),
            issued,
            lifetime,
            assoc_type: assoc_type.into(),
        })
    }

    /// Association issued `now` that expires in `expires_in` seconds.
    pub fn from_expires_in<H, T>(
        expires_in: i64,
        handle: H,
        secret: Vec<u8>,
        assoc_type: T,
        now: DateTime<Utc>,
    ) -> Result<Self, AssociationDataError>
    where
        H: Into<String>,
        T: Into<String>,
    {
        Self::new(handle, secret, now, expires_in, assoc_type)
    }

    /// The shared secret.
    pub fn secret(&self) -> &[u8] {
        self.secret.expose_secret()
    }

    /// Moment the association stops being usable.
    pub fn expires_at(&self) -> DateTime<Utc> {
        TimeDelta::try_seconds(self.lifetime)
            .and_then(|delta| self.issued.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Remaining lifetime in seconds, never negative.
    pub fn expires_in(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at() - now).num_seconds().max(0)
    }

    /// The association is valid while `now < issued + lifetime`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

impl Clone for Association {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            secret: SecretSlice::from(self.secret().to_vec()),
            issued: self.issued,
            lifetime: self.lifetime,
            assoc_type: self.assoc_type.clone(),
        }
    }
}

impl PartialEq for Association {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
            && self.secret() == other.secret()
            && self.issued == other.issued
            && self.lifetime == other.lifetime
            && self.assoc_type == other.assoc_type
    }
}

impl fmt::Debug for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Association")
            .field("handle", &self.handle)
            .field("secret", &"[REDACTED]")
            .field("issued", &self.issued)
            .field("lifetime", &self.lifetime)
            .field("assoc_type", &self.assoc_type)
            .finish()
    }
}
