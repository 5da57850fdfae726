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

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::BuilderError;
use crate::message::{OPENID1_NS, OPENID2_NS, ProtocolVersion};

/// OpenID 1.0 service type.
pub const OPENID_1_0_TYPE: &str = "http://openid.net/signon/1.0";
/// OpenID 1.1 service type.
pub const OPENID_1_1_TYPE: &str = "http://openid.net/signon/1.1";
/// OpenID 2.0 claimed identifier service type.
pub const OPENID_2_0_TYPE: &str = "http://specs.openid.net/auth/2.0/signon";
/// OpenID 2.0 OP identifier service type.
pub const OPENID_IDP_2_0_TYPE: &str = "http://specs.openid.net/auth/2.0/server";

/// Discovered OpenID service.
#[derive(Builder, Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[builder(build_fn(error = "BuilderError"))]
#[builder(setter(strip_option, into))]
pub struct ServiceEndpoint {
    /// Identifier the user claims to own.
    #[builder(default)]
    pub claimed_id: Option<String>,

    /// Identifier the provider knows the user under (OP-local identifier).
    #[builder(default)]
    pub local_id: Option<String>,

    /// Provider endpoint URL.
    #[builder(default)]
    pub server_url: Option<String>,

    /// Service type URIs advertised for the endpoint.
    #[builder(default)]
    pub type_uris: Vec<String>,
}

impl ServiceEndpoint {
    /// Endpoint for the OP identifier: the provider selects the identity.
    pub fn from_op_endpoint_url<S: Into<String>>(op_endpoint_url: S) -> Self {
        Self {
            claimed_id: None,
            local_id: None,
            server_url: Some(op_endpoint_url.into()),
            type_uris: vec![OPENID_IDP_2_0_TYPE.to_string()],
        }
    }

    /// Identifier sent to the provider as `openid.identity`.
    pub fn local_id_or_claimed(&self) -> Option<&str> {
        self.local_id.as_deref().or(self.claimed_id.as_deref())
    }

    pub fn uses_extension(&self, type_uri: &str) -> bool {
        self.type_uris.iter().any(|t| t == type_uri)
    }

    /// Whether the endpoint is an OP identifier rather than a claimed one.
    pub fn is_op_identifier(&self) -> bool {
        self.uses_extension(OPENID_IDP_2_0_TYPE)
    }

    /// Namespace the messages to the endpoint are written in.
    pub fn preferred_namespace(&self) -> &'static str {
        if self.is_op_identifier() || self.uses_extension(OPENID_2_0_TYPE) {
            OPENID2_NS
        } else {
            OPENID1_NS
        }
    }

    /// Protocol version matching [ServiceEndpoint::preferred_namespace].
    pub fn protocol_version(&self) -> ProtocolVersion {
        if self.compatibility_mode() {
            ProtocolVersion::OpenId1
        } else {
            ProtocolVersion::OpenId2
        }
    }

    /// Whether the endpoint only speaks OpenID 1.x.
    pub fn compatibility_mode(&self) -> bool {
        self.preferred_namespace() != OPENID2_NS
    }
}

/// Identifier without the URI fragment.
pub fn defragment(identifier: &str) -> &str {
    identifier
        .split_once('#')
        .map_or(identifier, |(base, _)| base)
}
