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

//! # Session negotiation
//!
//! The [SessionNegotiator] holds the ordered list of acceptable
//! `(assoc_type, session_type)` pairs. The first pair is proposed to the
//! provider; a pair the provider suggests instead is only accepted when it
//! is on the list.
//!
//! The secret is transported either in clear (`no-encryption`), which is
//! only acceptable over a confidential channel, or protected by a
//! Diffie-Hellman exchange ([dh]). The caller learns the used mode from
//! [ConsumerSession::session_type].
use crate::association::AssocType;
use crate::config::AssociationSection;

pub mod dh;
pub mod error;
pub mod session;
pub mod types;

pub use error::NegotiationError;
pub use session::ConsumerSession;
pub use types::SessionType;

/// Ordered set of acceptable association and session type pairs.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionNegotiator {
    allowed_types: Vec<(AssocType, SessionType)>,
}

impl SessionNegotiator {
    /// Negotiator accepting the given pairs in the order of preference.
    ///
    /// Every pair must be usable together.
    pub fn new<I>(allowed_types: I) -> Result<Self, NegotiationError>
    where
        I: IntoIterator<Item = (AssocType, SessionType)>,
    {
        let mut negotiator = Self {
            allowed_types: Vec::new(),
        };
        for (assoc_type, session_type) in allowed_types {
            negotiator.add_allowed_type(assoc_type, Some(session_type))?;
        }
        Ok(negotiator)
    }

    /// Negotiator for the `[association] allowed_types` setting.
    pub fn from_config(config: &AssociationSection) -> Result<Self, NegotiationError> {
        let mut pairs = Vec::with_capacity(config.allowed_types.len());
        for entry in &config.allowed_types {
            let (assoc_type, session_type) = entry
                .split_once(':')
                .ok_or_else(|| NegotiationError::InvalidPreference(entry.clone()))?;
            pairs.push((
                assoc_type.trim().parse::<AssocType>()?,
                session_type.trim().parse::<SessionType>()?,
            ));
        }
        Self::new(pairs)
    }

    /// Only the Diffie-Hellman protected pairs.
    pub fn encrypted() -> Self {
        Self {
            allowed_types: vec![
                (AssocType::HmacSha1, SessionType::DhSha1),
                (AssocType::HmacSha256, SessionType::DhSha256),
            ],
        }
    }

    /// Append the pair to the end of the preference list.
    ///
    /// Without a session type every session type compatible with the
    /// association type is appended, the encrypted ones first.
    pub fn add_allowed_type(
        &mut self,
        assoc_type: AssocType,
        session_type: Option<SessionType>,
    ) -> Result<(), NegotiationError> {
        match session_type {
            Some(session_type) => {
                if !session_type.allows(assoc_type) {
                    return Err(NegotiationError::IncompatibleTypes {
                        assoc_type: assoc_type.to_string(),
                        session_type: session_type.to_string(),
                    });
                }
                self.allowed_types.push((assoc_type, session_type));
            }
            None => {
                for session_type in SessionType::for_assoc_type(assoc_type) {
                    self.allowed_types.push((assoc_type, session_type));
                }
            }
        }
        Ok(())
    }

    /// Whether the pair named by the provider is acceptable.
    ///
    /// Unknown type names are never acceptable.
    pub fn is_allowed(&self, assoc_type: &str, session_type: &str) -> bool {
        match (assoc_type.parse::<AssocType>(), session_type.parse::<SessionType>()) {
            (Ok(assoc_type), Ok(session_type)) => self.is_allowed_pair(assoc_type, session_type),
            _ => false,
        }
    }

    pub fn is_allowed_pair(&self, assoc_type: AssocType, session_type: SessionType) -> bool {
        session_type.allows(assoc_type) && self.allowed_types.contains(&(assoc_type, session_type))
    }

    /// The preferred pair, `None` when nothing is allowed.
    pub fn get_allowed_type(&self) -> Option<(AssocType, SessionType)> {
        self.allowed_types.first().copied()
    }

    pub fn allowed_types(&self) -> &[(AssocType, SessionType)] {
        &self.allowed_types
    }
}

impl Default for SessionNegotiator {
    /// Every known pair, SHA-1 first and encrypted sessions before the
    /// cleartext one.
    fn default() -> Self {
        Self {
            allowed_types: vec![
                (AssocType::HmacSha1, SessionType::DhSha1),
                (AssocType::HmacSha1, SessionType::NoEncryption),
                (AssocType::HmacSha256, SessionType::DhSha256),
                (AssocType::HmacSha256, SessionType::NoEncryption),
            ],
        }
    }
}
