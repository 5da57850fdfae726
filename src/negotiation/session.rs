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

//! Consumer side of the association sessions.
use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha1::Sha1;
use sha2::Sha256;

use crate::association::AssocType;
use crate::message::Message;
use crate::negotiation::dh::{self, DiffieHellman};
use crate::negotiation::error::NegotiationError;
use crate::negotiation::types::SessionType;

/// Per request negotiation state. A session is used for exactly one
/// request and dropped afterwards.
#[derive(Debug)]
pub enum ConsumerSession {
    NoEncryption,
    DiffieHellman {
        session_type: SessionType,
        dh: DiffieHellman,
    },
}

impl ConsumerSession {
    /// New session of the given type with fresh key material.
    pub fn new(session_type: SessionType) -> Self {
        Self::with_dh(session_type, DiffieHellman::new())
    }

    /// Session using the given key pair (ignored for `no-encryption`).
    pub fn with_dh(session_type: SessionType, dh: DiffieHellman) -> Self {
        match session_type {
            SessionType::NoEncryption => Self::NoEncryption,
            _ => Self::DiffieHellman { session_type, dh },
        }
    }

    pub fn session_type(&self) -> SessionType {
        match self {
            Self::NoEncryption => SessionType::NoEncryption,
            Self::DiffieHellman { session_type, .. } => *session_type,
        }
    }

    /// Whether the session can transport the secret of the association type.
    pub fn allows(&self, assoc_type: AssocType) -> bool {
        self.session_type().allows(assoc_type)
    }

    /// Session specific arguments of the associate request.
    pub fn request_args(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::NoEncryption => Vec::new(),
            Self::DiffieHellman { dh, .. } => {
                let mut args = vec![("dh_consumer_public", dh::to_base64(dh.public()))];
                if !dh.uses_default_params() {
                    args.push(("dh_modulus", dh::to_base64(dh.modulus())));
                    args.push(("dh_gen", dh::to_base64(dh.generator())));
                }
                args
            }
        }
    }

    /// Recover the MAC key from the associate response.
    pub fn extract_secret(&self, response: &Message) -> Result<Vec<u8>, NegotiationError> {
        match self {
            Self::NoEncryption => {
                let mac_key = response
                    .get_arg("mac_key")
                    .ok_or(NegotiationError::MissingField("mac_key"))?;
                STANDARD
                    .decode(mac_key.trim())
                    .map_err(|_| NegotiationError::MalformedField("mac_key"))
            }
            Self::DiffieHellman { session_type, dh } => {
                let server_public = dh::from_base64(
                    "dh_server_public",
                    response
                        .get_arg("dh_server_public")
                        .ok_or(NegotiationError::MissingField("dh_server_public"))?,
                )?;
                let enc_mac_key = STANDARD
                    .decode(
                        response
                            .get_arg("enc_mac_key")
                            .ok_or(NegotiationError::MissingField("enc_mac_key"))?
                            .trim(),
                    )
                    .map_err(|_| NegotiationError::MalformedField("enc_mac_key"))?;
                match session_type {
                    SessionType::DhSha256 => dh.xor_secret::<Sha256>(&server_public, &enc_mac_key),
                    _ => dh.xor_secret::<Sha1>(&server_public, &enc_mac_key),
                }
            }
        }
    }
}
