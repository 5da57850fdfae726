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

//! # Association requester
//!
//! Establishes the association with the provider:
//!
//!   1. the preferred `(assoc_type, session_type)` pair of the
//!      [SessionNegotiator] is sent in the `associate` request,
//!
//!   2. when the provider answers with the `unsupported-type` error naming a
//!      pair that is allowed as well, the request is repeated exactly once
//!      with that pair. Legacy (OpenID 1) error replies are always final,
//!
//!   3. the reply is validated ([extract::extract_association]) and the
//!      association is persisted in the [AssociationStore].
//!
//! Nothing is stored when any of the steps fails. Every request uses fresh
//! session key material.
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

pub mod error;
pub mod extract;
pub mod transport;

use crate::association::{AssocType, Association};
use crate::common::clock::{Clock, system_clock};
use crate::config::Config;
use crate::discovery::ServiceEndpoint;
use crate::message::{Message, ProtocolVersion};
use crate::negotiation::{ConsumerSession, NegotiationError, SessionNegotiator, SessionType};
use crate::store::AssociationStore;
pub use error::{AssociationError, ServerError, TransportError};
pub use transport::Transport;

/// Default timeout of the association request.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the `associate` request for the given pair.
pub fn create_associate_request(
    version: ProtocolVersion,
    assoc_type: AssocType,
    session: &ConsumerSession,
) -> Message {
    let mut request = Message::new(version);
    request.set_arg("mode", "associate");
    request.set_arg("assoc_type", assoc_type.as_str());
    // OpenID 1 providers treat an absent session type as cleartext.
    if version == ProtocolVersion::OpenId2 || session.session_type().is_encrypted() {
        request.set_arg("session_type", session.session_type().as_str());
    }
    for (key, value) in session.request_args() {
        request.set_arg(key, value);
    }
    request
}

/// Association requester.
#[derive(Clone)]
pub struct AssociationRequester {
    negotiator: SessionNegotiator,
    store: Arc<dyn AssociationStore>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl AssociationRequester {
    pub fn new(
        negotiator: SessionNegotiator,
        store: Arc<dyn AssociationStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            negotiator,
            store,
            transport,
            clock: system_clock(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Requester using the `[association]` settings.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn AssociationStore>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, NegotiationError> {
        Ok(
            Self::new(SessionNegotiator::from_config(&config.association)?, store, transport)
                .with_timeout(Duration::from_secs(config.association.timeout)),
        )
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn negotiator(&self) -> &SessionNegotiator {
        &self.negotiator
    }

    /// Live association with the endpoint, negotiating a new one when the
    /// store has none.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_association(
        &self,
        endpoint: &ServiceEndpoint,
    ) -> Result<Association, AssociationError> {
        let server_url = endpoint
            .server_url
            .as_deref()
            .ok_or(AssociationError::MissingServerUrl)?;
        if let Some(association) = self.store.get_association(server_url, None).await?
            && association.expires_in(self.clock.now()) > 0
        {
            return Ok(association);
        }
        self.negotiate_association(endpoint).await
    }

    /// Establish a new association with the endpoint.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn negotiate_association(
        &self,
        endpoint: &ServiceEndpoint,
    ) -> Result<Association, AssociationError> {
        let server_url = endpoint
            .server_url
            .as_deref()
            .ok_or(AssociationError::MissingServerUrl)?;
        let version = endpoint.protocol_version();
        let (assoc_type, session_type) = self
            .negotiator
            .get_allowed_type()
            .ok_or(AssociationError::NoAllowedType)?;

        let server_error = match self
            .request_association(server_url, version, assoc_type, session_type)
            .await
        {
            Err(AssociationError::Server { error, .. }) => error,
            other => return other,
        };

        let (assoc_type, session_type) =
            self.extract_supported_association_type(server_url, assoc_type, server_error)?;
        match self
            .request_association(server_url, version, assoc_type, session_type)
            .await
        {
            Err(AssociationError::Server { .. }) => {
                error!(
                    "Server {} refused its suggested association type: session_type={}, assoc_type={}",
                    server_url, session_type, assoc_type
                );
                Err(AssociationError::FallbackRefused {
                    server_url: server_url.to_string(),
                    assoc_type: assoc_type.to_string(),
                    session_type: session_type.to_string(),
                })
            }
            other => other,
        }
    }

    /// Pick the pair suggested in the `unsupported-type` error reply.
    fn extract_supported_association_type(
        &self,
        server_url: &str,
        assoc_type: AssocType,
        server_error: ServerError,
    ) -> Result<(AssocType, SessionType), AssociationError> {
        if !server_error.is_unsupported_type() || server_error.message.is_openid1() {
            error!(
                "Server error when requesting an association from {}: {}",
                server_url, server_error.error_text
            );
            return Err(AssociationError::Server {
                server_url: server_url.to_string(),
                error: server_error,
            });
        }

        info!(
            "Unsupported association type {}: {}",
            assoc_type, server_error.error_text
        );
        let (Some(assoc_type), Some(session_type)) = (
            server_error.message.get_arg("assoc_type"),
            server_error.message.get_arg("session_type"),
        ) else {
            error!(
                "Server responded with unsupported association session but did not supply a fallback."
            );
            return Err(AssociationError::NoFallback);
        };

        match (assoc_type.parse::<AssocType>(), session_type.parse::<SessionType>()) {
            (Ok(assoc), Ok(session)) if self.negotiator.is_allowed_pair(assoc, session) => {
                Ok((assoc, session))
            }
            _ => {
                error!(
                    "Server sent unsupported session/association type: session_type={}, assoc_type={}",
                    session_type, assoc_type
                );
                Err(AssociationError::FallbackNotAllowed {
                    assoc_type: assoc_type.to_string(),
                    session_type: session_type.to_string(),
                })
            }
        }
    }

    /// One request/reply round trip.
    async fn request_association(
        &self,
        server_url: &str,
        version: ProtocolVersion,
        assoc_type: AssocType,
        session_type: SessionType,
    ) -> Result<Association, AssociationError> {
        let session = ConsumerSession::new(session_type);
        let request = create_associate_request(version, assoc_type, &session);

        let response =
            tokio::time::timeout(self.timeout, self.transport.exchange(server_url, &request))
                .await
                .map_err(|_| AssociationError::Timeout {
                    server_url: server_url.to_string(),
                    seconds: self.timeout.as_secs(),
                })??;

        if response.has_key("error") {
            return Err(AssociationError::Server {
                server_url: server_url.to_string(),
                error: ServerError::from_message(response),
            });
        }

        let association =
            extract::extract_association(&response, &session, version, self.clock.now())?;
        self.store
            .store_association(server_url, &association)
            .await?;
        Ok(association)
    }
}

#[cfg(test)]
mod tests {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use tracing_test::traced_test;

    use super::transport::MockTransport;
    use super::*;
    use crate::common::clock::FixedClock;
    use crate::discovery::{OPENID_1_1_TYPE, OPENID_2_0_TYPE};
    use crate::error::ErrorKind;
    use crate::message::OPENID2_NS;
    use crate::plugin_manager::PluginManager;
    use crate::store::StoreProvider;

    const OP: &str = "https://idp.example/op";

    fn endpoint(type_uri: &str) -> ServiceEndpoint {
        ServiceEndpoint {
            claimed_id: Some("http://user.example/".into()),
            local_id: None,
            server_url: Some(OP.into()),
            type_uris: vec![type_uri.into()],
        }
    }

    fn store(clock: &FixedClock) -> Arc<StoreProvider> {
        let mut config = Config::default();
        config.store.driver = "memory".into();
        Arc::new(
            StoreProvider::new(&config, &PluginManager::default(), None)
                .unwrap()
                .with_clock(Arc::new(clock.clone())),
        )
    }

    fn requester(
        negotiator: SessionNegotiator,
        transport: MockTransport,
        store: Arc<StoreProvider>,
        clock: &FixedClock,
    ) -> AssociationRequester {
        AssociationRequester::new(negotiator, store, Arc::new(transport))
            .with_clock(Arc::new(clock.clone()))
    }

    fn plain_only() -> SessionNegotiator {
        SessionNegotiator::new([
            (AssocType::HmacSha1, SessionType::NoEncryption),
            (AssocType::HmacSha256, SessionType::NoEncryption),
        ])
        .unwrap()
    }

    fn success(assoc_type: &str, handle: &str) -> Message {
        let key_length = assoc_type
            .parse::<AssocType>()
            .map_or(20, |parsed| parsed.key_length());
        let key = STANDARD.encode(vec![5u8; key_length]);
        Message::from_openid_args([
            ("ns", OPENID2_NS),
            ("assoc_type", assoc_type),
            ("assoc_handle", handle),
            ("expires_in", "600"),
            ("session_type", "no-encryption"),
            ("mac_key", key.as_str()),
        ])
        .unwrap()
    }

    fn unsupported(fallback: &[(&str, &str)]) -> Message {
        let mut msg = Message::from_openid_args([
            ("ns", OPENID2_NS),
            ("error", "Unsupported type"),
            ("error_code", "unsupported-type"),
        ])
        .unwrap();
        for (k, v) in fallback {
            msg.set_arg(*k, *v);
        }
        msg
    }

    #[test]
    fn test_associate_request() {
        let session = ConsumerSession::new(SessionType::NoEncryption);
        let request = create_associate_request(ProtocolVersion::OpenId2, AssocType::HmacSha1, &session);
        let args = request.to_args();
        assert_eq!(Some("associate"), args.get("mode").map(String::as_str));
        assert_eq!(Some(OPENID2_NS), args.get("ns").map(String::as_str));
        assert_eq!(Some("no-encryption"), args.get("session_type").map(String::as_str));

        let request = create_associate_request(ProtocolVersion::OpenId1, AssocType::HmacSha1, &session);
        let args = request.to_args();
        assert!(!args.contains_key("ns"));
        assert!(!args.contains_key("session_type"));

        let session = ConsumerSession::new(SessionType::DhSha1);
        let request = create_associate_request(ProtocolVersion::OpenId1, AssocType::HmacSha1, &session);
        assert_eq!(Some("DH-SHA1"), request.get_arg("session_type"));
        assert!(request.has_key("dh_consumer_public"));
        assert!(!request.has_key("dh_modulus"));
    }

    #[tokio::test]
    async fn test_success_is_stored() {
        let clock = FixedClock::new(1000);
        let store = store(&clock);
        let mut transport = MockTransport::default();
        transport
            .expect_exchange()
            .withf(|url: &str, req: &Message| {
                url == OP
                    && req.get_arg("assoc_type") == Some("HMAC-SHA1")
                    && req.get_arg("session_type") == Some("no-encryption")
            })
            .times(1)
            .returning(|_, _| Ok(success("HMAC-SHA1", "h1")));
        let requester = requester(plain_only(), transport, store.clone(), &clock);

        let assoc = requester
            .get_association(&endpoint(OPENID_2_0_TYPE))
            .await
            .unwrap();
        assert_eq!("h1", assoc.handle);
        assert_eq!(1000, assoc.issued.timestamp());
        assert_eq!(
            Some(assoc),
            store.get_association(OP, Some("h1")).await.unwrap()
        );

        // The stored association is reused without another request.
        assert_eq!(
            "h1",
            requester
                .get_association(&endpoint(OPENID_2_0_TYPE))
                .await
                .unwrap()
                .handle
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn test_fallback_success() {
        let clock = FixedClock::new(1000);
        let store = store(&clock);
        let mut transport = MockTransport::default();
        transport
            .expect_exchange()
            .withf(|_, req: &Message| req.get_arg("assoc_type") == Some("HMAC-SHA1"))
            .times(1)
            .returning(|_, _| {
                Ok(unsupported(&[
                    ("assoc_type", "HMAC-SHA256"),
                    ("session_type", "no-encryption"),
                ]))
            });
        transport
            .expect_exchange()
            .withf(|_, req: &Message| req.get_arg("assoc_type") == Some("HMAC-SHA256"))
            .times(1)
            .returning(|_, _| Ok(success("HMAC-SHA256", "h256")));
        let requester = requester(plain_only(), transport, store.clone(), &clock);

        let assoc = requester
            .negotiate_association(&endpoint(OPENID_2_0_TYPE))
            .await
            .unwrap();
        assert_eq!("HMAC-SHA256", assoc.assoc_type);
        assert_eq!(32, assoc.secret().len());
        assert!(logs_contain("Unsupported association type HMAC-SHA1"));
        assert!(store.get_association(OP, Some("h256")).await.unwrap().is_some());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_no_fallback_single_request() {
        let clock = FixedClock::new(1000);
        let store = store(&clock);
        let mut transport = MockTransport::default();
        transport
            .expect_exchange()
            .times(1)
            .returning(|_, _| Ok(unsupported(&[])));
        let requester = requester(plain_only(), transport, store.clone(), &clock);

        let err = requester
            .negotiate_association(&endpoint(OPENID_2_0_TYPE))
            .await
            .unwrap_err();
        assert!(matches!(err, AssociationError::NoFallback));
        assert_eq!(ErrorKind::UnsupportedType, err.kind());
        assert!(logs_contain("did not supply a fallback"));
        assert!(store.get_association(OP, None).await.unwrap().is_none());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_fallback_not_allowed() {
        let clock = FixedClock::new(1000);
        let mut transport = MockTransport::default();
        transport.expect_exchange().times(1).returning(|_, _| {
            Ok(unsupported(&[
                ("assoc_type", "HMAC-SHA256"),
                ("session_type", "DH-SHA256"),
            ]))
        });
        let requester = requester(plain_only(), transport, store(&clock), &clock);

        assert!(matches!(
            requester
                .negotiate_association(&endpoint(OPENID_2_0_TYPE))
                .await,
            Err(AssociationError::FallbackNotAllowed { .. })
        ));
        assert!(logs_contain(
            "Server sent unsupported session/association type: session_type=DH-SHA256, assoc_type=HMAC-SHA256"
        ));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_fallback_refused() {
        let clock = FixedClock::new(1000);
        let mut transport = MockTransport::default();
        transport.expect_exchange().times(2).returning(|_, _| {
            Ok(unsupported(&[
                ("assoc_type", "HMAC-SHA256"),
                ("session_type", "no-encryption"),
            ]))
        });
        let requester = requester(plain_only(), transport, store(&clock), &clock);

        assert!(matches!(
            requester
                .negotiate_association(&endpoint(OPENID_2_0_TYPE))
                .await,
            Err(AssociationError::FallbackRefused { .. })
        ));
        assert!(logs_contain("refused its suggested association type"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_openid1_error_is_terminal() {
        let clock = FixedClock::new(1000);
        let mut transport = MockTransport::default();
        transport.expect_exchange().times(1).returning(|_, _| {
            Ok(Message::from_openid_args([
                ("error", "Unsupported type"),
                ("error_code", "unsupported-type"),
                ("assoc_type", "HMAC-SHA256"),
                ("session_type", "no-encryption"),
            ])
            .unwrap())
        });
        let requester = requester(plain_only(), transport, store(&clock), &clock);

        let err = requester
            .negotiate_association(&endpoint(OPENID_1_1_TYPE))
            .await
            .unwrap_err();
        assert!(matches!(err, AssociationError::Server { .. }));
        assert!(logs_contain("Server error when requesting an association from"));
    }

    #[tokio::test]
    async fn test_other_server_error_is_terminal() {
        let clock = FixedClock::new(1000);
        let mut transport = MockTransport::default();
        transport.expect_exchange().times(1).returning(|_, _| {
            Ok(Message::from_openid_args([("ns", OPENID2_NS), ("error", "Go away")]).unwrap())
        });
        let requester = requester(plain_only(), transport, store(&clock), &clock);

        let err = requester
            .negotiate_association(&endpoint(OPENID_2_0_TYPE))
            .await
            .unwrap_err();
        assert_eq!(ErrorKind::MalformedResponse, err.kind());
    }

    #[tokio::test]
    async fn test_session_mismatch_not_stored() {
        let clock = FixedClock::new(1000);
        let store = store(&clock);
        let mut transport = MockTransport::default();
        transport
            .expect_exchange()
            .times(1)
            .returning(|_, _| Ok(success("HMAC-SHA1", "h1")));
        let requester = requester(SessionNegotiator::encrypted(), transport, store.clone(), &clock);

        let err = requester
            .negotiate_association(&endpoint(OPENID_2_0_TYPE))
            .await
            .unwrap_err();
        assert_eq!(ErrorKind::SessionMismatch, err.kind());
        assert!(store.get_association(OP, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let clock = FixedClock::new(1000);
        let mut transport = MockTransport::default();
        transport.expect_exchange().times(1).returning(|url, _| {
            Err(TransportError::Connection {
                url: url.to_string(),
                message: "refused".into(),
            })
        });
        let requester = requester(plain_only(), transport, store(&clock), &clock);

        assert_eq!(
            ErrorKind::Transport,
            requester
                .negotiate_association(&endpoint(OPENID_2_0_TYPE))
                .await
                .unwrap_err()
                .kind()
        );
    }

    #[derive(Debug)]
    struct SlowTransport;

    #[async_trait::async_trait]
    impl Transport for SlowTransport {
        async fn exchange<'a>(
            &self,
            _server_url: &'a str,
            _request: &'a Message,
        ) -> Result<Message, TransportError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(success("HMAC-SHA1", "late"))
        }
    }

    #[tokio::test]
    async fn test_timeout() {
        let clock = FixedClock::new(1000);
        let store = store(&clock);
        let requester =
            AssociationRequester::new(plain_only(), store.clone(), Arc::new(SlowTransport))
                .with_clock(Arc::new(clock.clone()))
            .with_timeout(Duration::from_millis(50));

        assert!(matches!(
            requester
                .negotiate_association(&endpoint(OPENID_2_0_TYPE))
                .await,
            Err(AssociationError::Timeout { .. })
        ));
        assert!(store.get_association(OP, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_from_config() {
        let clock = FixedClock::new(1000);
        let mut config = Config::default();
        config.association.allowed_types = vec!["HMAC-SHA256:DH-SHA256".into()];
        let requester =
            AssociationRequester::from_config(&config, store(&clock), Arc::new(MockTransport::default()))
                .unwrap();
        assert_eq!(
            Some((AssocType::HmacSha256, SessionType::DhSha256)),
            requester.negotiator().get_allowed_type()
        );
    }
}
