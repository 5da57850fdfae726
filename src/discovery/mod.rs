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

//! # Discovery verification
//!
//! A positive assertion names the claimed identifier, the OP-local
//! identifier and the provider endpoint. Before the assertion is trusted the
//! relying party confirms that discovery on the claimed identifier actually
//! leads to that provider:
//!
//!   - the endpoint discovered when the authentication started (if the
//!     caller kept it) is compared with the assertion first,
//!
//!   - when it is missing or does not match, the claimed identifier is
//!     discovered again through the [Discoverer] and every discovered service
//!     is compared in turn.
//!
//! Assertions without any identifier (the provider only authenticated the
//! user to itself) are verified trivially.
//!
//! Claimed identifiers are compared without the URI fragment, while the
//! returned endpoint carries the fragment the assertion used.
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

pub mod error;
pub mod types;

use crate::message::Message;
use crate::requester::error::TransportError;
pub use error::DiscoveryError;
pub use types::*;

/// Resolve an identifier into the OpenID services it advertises.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Discoverer: Send + Sync + Debug {
    /// Discover the services of the (fragment free) identifier in the order
    /// of their priority.
    async fn discover<'a>(
        &self,
        identifier: &'a str,
    ) -> Result<Vec<ServiceEndpoint>, TransportError>;
}

/// Discovery verifier.
#[derive(Clone, Debug)]
pub struct DiscoveryVerifier {
    discoverer: Arc<dyn Discoverer>,
}

impl DiscoveryVerifier {
    pub fn new(discoverer: Arc<dyn Discoverer>) -> Self {
        Self { discoverer }
    }

    /// Verify that the assertion is backed by the discovery information of
    /// its claimed identifier.
    ///
    /// `endpoint` is the endpoint discovered when the authentication was
    /// started, if any.
    #[tracing::instrument(level = "debug", skip(self, response))]
    pub async fn verify_discovery_results(
        &self,
        response: &Message,
        endpoint: Option<&ServiceEndpoint>,
    ) -> Result<ServiceEndpoint, DiscoveryError> {
        if response.is_openid1() {
            self.verify_openid1(response, endpoint).await
        } else {
            self.verify_openid2(response, endpoint).await
        }
    }

    async fn verify_openid2(
        &self,
        response: &Message,
        endpoint: Option<&ServiceEndpoint>,
    ) -> Result<ServiceEndpoint, DiscoveryError> {
        let op_endpoint = response
            .get_arg("op_endpoint")
            .ok_or(DiscoveryError::MissingField("op_endpoint"))?;
        let claimed_id = match (response.get_arg("claimed_id"), response.get_arg("identity")) {
            (None, None) => return Ok(ServiceEndpoint::from_op_endpoint_url(op_endpoint)),
            (None, Some(_)) => return Err(DiscoveryError::IdentityWithoutClaimedId),
            (Some(_), None) => return Err(DiscoveryError::ClaimedIdWithoutIdentity),
            (Some(claimed_id), Some(_)) => claimed_id,
        };
        let to_match = ServiceEndpoint {
            claimed_id: Some(claimed_id.to_string()),
            local_id: response.get_arg("identity").map(String::from),
            server_url: Some(op_endpoint.to_string()),
            type_uris: vec![OPENID_2_0_TYPE.to_string()],
        };

        let mut verified = match endpoint {
            None => {
                info!("No pre-discovered information supplied");
                self.discover_and_verify(claimed_id, std::slice::from_ref(&to_match))
                    .await?
            }
            Some(endpoint) => match verify_single(endpoint, &to_match) {
                Ok(()) => endpoint.clone(),
                Err(err) => {
                    info!("Error attempting to use stored discovery information: {}", err);
                    info!("Attempting discovery to verify endpoint");
                    self.discover_and_verify(claimed_id, std::slice::from_ref(&to_match))
                        .await?
                }
            },
        };
        // The discovered identifier has no fragment.
        if verified.claimed_id != to_match.claimed_id {
            verified.claimed_id = to_match.claimed_id;
        }
        Ok(verified)
    }

    async fn verify_openid1(
        &self,
        response: &Message,
        endpoint: Option<&ServiceEndpoint>,
    ) -> Result<ServiceEndpoint, DiscoveryError> {
        let claimed_id = response
            .get_bare_arg("openid1_claimed_id")
            .or_else(|| endpoint.and_then(|e| e.claimed_id.as_deref()))
            .ok_or(DiscoveryError::NoClaimedId)?;
        let local_id = response
            .get_arg("identity")
            .ok_or(DiscoveryError::MissingField("identity"))?;

        let to_match = ServiceEndpoint {
            claimed_id: Some(claimed_id.to_string()),
            local_id: Some(local_id.to_string()),
            server_url: None,
            type_uris: vec![OPENID_1_1_TYPE.to_string()],
        };
        let to_match_1_0 = ServiceEndpoint {
            type_uris: vec![OPENID_1_0_TYPE.to_string()],
            ..to_match.clone()
        };

        let stored = endpoint.and_then(|endpoint| {
            let result = match verify_single(endpoint, &to_match) {
                Err(DiscoveryError::TypeMismatch(_)) => verify_single(endpoint, &to_match_1_0),
                other => other,
            };
            match result {
                Ok(()) => Some(endpoint.clone()),
                Err(err) => {
                    info!("Error attempting to use stored discovery information: {}", err);
                    info!("Attempting discovery to verify endpoint");
                    None
                }
            }
        });
        let mut verified = match stored {
            Some(verified) => verified,
            None => {
                self.discover_and_verify(claimed_id, &[to_match.clone(), to_match_1_0])
                    .await?
            }
        };
        // The discovered identifier has no fragment.
        if verified.claimed_id != to_match.claimed_id {
            verified.claimed_id = to_match.claimed_id;
        }
        Ok(verified)
    }

    /// Discover the claimed identifier and return the first service
    /// matching any of `to_match`.
    #[tracing::instrument(level = "debug", skip(self, to_match))]
    pub async fn discover_and_verify(
        &self,
        claimed_id: &str,
        to_match: &[ServiceEndpoint],
    ) -> Result<ServiceEndpoint, DiscoveryError> {
        info!("Performing discovery on {}", claimed_id);
        let services = self.discoverer.discover(defragment(claimed_id)).await?;
        if services.is_empty() {
            return Err(DiscoveryError::NoServices(claimed_id.to_string()));
        }

        let mut failures: Vec<String> = Vec::new();
        for service in services {
            for candidate in to_match {
                match verify_single(&service, candidate) {
                    Ok(()) => return Ok(service),
                    Err(err) => failures.push(err.to_string()),
                }
            }
        }

        error!("Discovery verification failure for {}", claimed_id);
        for failure in &failures {
            error!(" * Endpoint mismatch: {}", failure);
        }
        Err(DiscoveryError::NoMatchingEndpoint {
            claimed_id: claimed_id.to_string(),
            failures,
        })
    }
}

/// Compare the discovered endpoint with the information from the assertion.
///
/// `server_url` is only compared when the assertion carries one (OpenID 2).
pub fn verify_single(
    endpoint: &ServiceEndpoint,
    to_match: &ServiceEndpoint,
) -> Result<(), DiscoveryError> {
    for type_uri in &to_match.type_uris {
        if !endpoint.uses_extension(type_uri) {
            return Err(DiscoveryError::TypeMismatch(type_uri.clone()));
        }
    }

    let defragged = to_match.claimed_id.as_deref().map(defragment);
    if defragged != endpoint.claimed_id.as_deref() {
        return Err(DiscoveryError::ClaimedIdMismatch {
            expected: defragged.unwrap_or_default().to_string(),
            got: endpoint.claimed_id.clone().unwrap_or_default(),
        });
    }

    if to_match.local_id_or_claimed() != endpoint.local_id_or_claimed() {
        return Err(DiscoveryError::LocalIdMismatch {
            expected: to_match.local_id_or_claimed().unwrap_or_default().to_string(),
            got: endpoint.local_id_or_claimed().unwrap_or_default().to_string(),
        });
    }

    if let Some(server_url) = &to_match.server_url
        && Some(server_url) != endpoint.server_url.as_ref()
    {
        return Err(DiscoveryError::ServerUrlMismatch {
            expected: server_url.clone(),
            got: endpoint.server_url.clone().unwrap_or_default(),
        });
    }
    Ok(())
}
