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

use crate::error::ErrorKind;
use crate::requester::error::TransportError;

/// Discovery verification error.
///
/// Every variant carries the reason the assertion could not be matched with
/// a discovered endpoint.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// `openid.claimed_id` present without `openid.identity`.
    #[error("openid.claimed_id is present without openid.identity")]
    ClaimedIdWithoutIdentity,

    /// Claimed identifier differs.
    #[error("claimed ID does not match (different subjects!), expected {expected}, got {got}")]
    ClaimedIdMismatch { expected: String, got: String },

    /// Discovery itself failed.
    #[error("discovery failed")]
    Discoverer {
        /// The source of the error.
        #[from]
        source: TransportError,
    },

    /// `openid.identity` present without `openid.claimed_id`.
    #[error("openid.identity is present without openid.claimed_id")]
    IdentityWithoutClaimedId,

    /// OP-local identifier differs.
    #[error("local ID mismatch, expected {expected}, got {got}")]
    LocalIdMismatch { expected: String, got: String },

    /// Required assertion field is missing.
    #[error("missing required field openid.{0}")]
    MissingField(&'static str),

    /// Legacy assertion without a claimed identifier to verify.
    #[error("no claimed identifier for the OpenID 1 assertion")]
    NoClaimedId,

    /// None of the discovered services matches the assertion.
    #[error("no matching endpoint found after discovering {claimed_id}: {}", failures.join("; "))]
    NoMatchingEndpoint {
        claimed_id: String,
        failures: Vec<String>,
    },

    /// Discovery returned no OpenID service.
    #[error("no OpenID information found at {0}")]
    NoServices(String),

    /// Provider endpoint URL differs.
    #[error("OP endpoint mismatch, expected {expected}, got {got}")]
    ServerUrlMismatch { expected: String, got: String },

    /// Endpoint does not advertise the service type of the assertion.
    #[error("type {0} is not supported by the endpoint")]
    TypeMismatch(String),
}

impl DiscoveryError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ClaimedIdWithoutIdentity
            | Self::IdentityWithoutClaimedId
            | Self::MissingField(_)
            | Self::NoClaimedId => ErrorKind::MalformedResponse,
            Self::Discoverer { .. } => ErrorKind::Transport,
            Self::ClaimedIdMismatch { .. }
            | Self::LocalIdMismatch { .. }
            | Self::NoMatchingEndpoint { .. }
            | Self::NoServices(_)
            | Self::ServerUrlMismatch { .. }
            | Self::TypeMismatch(_) => ErrorKind::DiscoveryMismatch,
        }
    }
}
