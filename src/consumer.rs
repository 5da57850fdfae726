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

//! # Relying party facade
//!
//! Groups the association requester, the discovery verifier and the nonce
//! check the way the sign-on flow uses them. The signature check and the
//! browser redirects are left to the embedding application.
use std::sync::Arc;

use tracing::info;

use crate::association::Association;
use crate::config::Config;
use crate::discovery::{Discoverer, DiscoveryVerifier, ServiceEndpoint};
use crate::error::OpenIdError;
use crate::message::Message;
use crate::nonce;
use crate::requester::{AssociationRequester, Transport};
use crate::store::AssociationStore;

/// Bare `return_to` argument carrying the nonce of the legacy protocol.
pub const OPENID1_NONCE_ARG: &str = "janrain_nonce";

/// OpenID relying party.
#[derive(Clone)]
pub struct Consumer {
    requester: AssociationRequester,
    verifier: DiscoveryVerifier,
    store: Arc<dyn AssociationStore>,
}

impl Consumer {
    pub fn new(
        config: &Config,
        store: Arc<dyn AssociationStore>,
        transport: Arc<dyn Transport>,
        discoverer: Arc<dyn Discoverer>,
    ) -> Result<Self, OpenIdError> {
        Ok(Self {
            requester: AssociationRequester::from_config(config, store.clone(), transport)?,
            verifier: DiscoveryVerifier::new(discoverer),
            store,
        })
    }

    pub fn requester(&self) -> &AssociationRequester {
        &self.requester
    }

    /// Association to sign the requests to the endpoint with.
    pub async fn associate(&self, endpoint: &ServiceEndpoint) -> Result<Association, OpenIdError> {
        Ok(self.requester.get_association(endpoint).await?)
    }

    /// Confirm the endpoint the assertion came from.
    pub async fn verify_discovery(
        &self,
        response: &Message,
        endpoint: Option<&ServiceEndpoint>,
    ) -> Result<ServiceEndpoint, OpenIdError> {
        Ok(self
            .verifier
            .verify_discovery_results(response, endpoint)
            .await?)
    }

    /// Consume the nonce of the positive assertion.
    ///
    /// OpenID 2 assertions carry `openid.response_nonce` scoped to the
    /// provider endpoint. Legacy assertions carry the nonce the relying
    /// party added to its own `return_to` URL, scoped to the empty server
    /// URL.
    #[tracing::instrument(level = "debug", skip(self, response))]
    pub async fn check_nonce(
        &self,
        response: &Message,
        endpoint: &ServiceEndpoint,
    ) -> Result<(), OpenIdError> {
        let (value, server_url) = if response.is_openid1() {
            (response.get_bare_arg(OPENID1_NONCE_ARG), "")
        } else {
            (
                response.get_arg("response_nonce"),
                endpoint.server_url.as_deref().unwrap_or_default(),
            )
        };
        let value = value.ok_or(OpenIdError::NonceMissing)?;
        let (timestamp, salt) = nonce::split_nonce(value)?;
        if !self.store.use_nonce(server_url, timestamp, salt).await? {
            info!("Nonce already used or out of range: {}", value);
            return Err(OpenIdError::NonceRejected);
        }
        Ok(())
    }
}
