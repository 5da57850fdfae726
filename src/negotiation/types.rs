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

use std::fmt;
use std::str::FromStr;

use crate::association::AssocType;
use crate::negotiation::error::NegotiationError;

/// Method protecting the MAC secret while it is transferred.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SessionType {
    /// Secret sent in clear, acceptable only over a confidential channel.
    NoEncryption,
    /// Diffie-Hellman with SHA-1.
    DhSha1,
    /// Diffie-Hellman with SHA-256.
    DhSha256,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoEncryption => "no-encryption",
            Self::DhSha1 => "DH-SHA1",
            Self::DhSha256 => "DH-SHA256",
        }
    }

    /// Association types the session can transport a secret for.
    pub fn allowed_assoc_types(&self) -> &'static [AssocType] {
        match self {
            Self::NoEncryption => &[AssocType::HmacSha1, AssocType::HmacSha256],
            Self::DhSha1 => &[AssocType::HmacSha1],
            Self::DhSha256 => &[AssocType::HmacSha256],
        }
    }

    pub fn allows(&self, assoc_type: AssocType) -> bool {
        self.allowed_assoc_types().contains(&assoc_type)
    }

    /// Session types usable with the association type, encrypted first.
    pub fn for_assoc_type(assoc_type: AssocType) -> Vec<SessionType> {
        [Self::DhSha1, Self::DhSha256, Self::NoEncryption]
            .into_iter()
            .filter(|session| session.allows(assoc_type))
            .collect()
    }

    /// Whether the secret is protected by the session itself.
    pub fn is_encrypted(&self) -> bool {
        !matches!(self, Self::NoEncryption)
    }
}

impl FromStr for SessionType {
    type Err = NegotiationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no-encryption" => Ok(Self::NoEncryption),
            "DH-SHA1" => Ok(Self::DhSha1),
            "DH-SHA256" => Ok(Self::DhSha256),
            other => Err(NegotiationError::UnknownSessionType(other.to_string())),
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
