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

//! Association reply validation.
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::association::{AssocType, Association, MAX_LIFETIME};
use crate::message::{Message, ProtocolVersion};
use crate::negotiation::{ConsumerSession, SessionType};
use crate::requester::error::AssociationError;

fn required<'m>(response: &'m Message, field: &'static str) -> Result<&'m str, AssociationError> {
    response
        .get_arg(field)
        .ok_or(AssociationError::MissingField(field))
}

fn parse_expires_in(value: &str) -> Result<i64, AssociationError> {
    match value.trim().parse::<i64>() {
        Ok(expires_in) if (0..=MAX_LIFETIME).contains(&expires_in) => Ok(expires_in),
        _ => Err(AssociationError::InvalidExpiresIn(value.to_string())),
    }
}

/// Session type of the legacy reply. An absent or empty value means
/// `no-encryption`.
fn openid1_session_type(response: &Message) -> &str {
    match response.get_arg("session_type") {
        Some(session_type) if session_type == SessionType::NoEncryption.as_str() => {
            warn!(
                "OpenID server sent \"no-encryption\" for OpenID 1.X: {:?}",
                response.get_arg("assoc_handle")
            );
            session_type
        }
        None | Some("") => SessionType::NoEncryption.as_str(),
        Some(session_type) => session_type,
    }
}

/// Validate the associate reply and build the association issued at `now`.
///
/// `version` is the protocol version of the request; an OpenID 2 request
/// must be answered in the OpenID 2 namespace.
pub fn extract_association(
    response: &Message,
    session: &ConsumerSession,
    version: ProtocolVersion,
    now: DateTime<Utc>,
) -> Result<Association, AssociationError> {
    if version == ProtocolVersion::OpenId2 && response.is_openid1() {
        return Err(AssociationError::MissingField("ns"));
    }
    let assoc_type = required(response, "assoc_type")?;
    let assoc_handle = required(response, "assoc_handle")?;
    let expires_in = parse_expires_in(required(response, "expires_in")?)?;

    let session_type = if response.is_openid1() {
        openid1_session_type(response)
    } else {
        required(response, "session_type")?
    };

    let expected = session.session_type();
    if session_type != expected.as_str() {
        warn!(
            "Session type mismatch. Expected {}, got {}",
            expected, session_type
        );
        return Err(AssociationError::SessionMismatch {
            expected: expected.to_string(),
            got: session_type.to_string(),
        });
    }

    if !assoc_type
        .parse::<AssocType>()
        .is_ok_and(|parsed| session.allows(parsed))
    {
        warn!(
            "Unsupported assoc_type for session {} returned: {}",
            expected, assoc_type
        );
        return Err(AssociationError::UnsupportedAssocType {
            assoc_type: assoc_type.to_string(),
            session_type: expected.to_string(),
        });
    }

    let secret = session
        .extract_secret(response)
        .map_err(|source| AssociationError::MalformedSession {
            session_type: expected.to_string(),
            source,
        })?;

    Ok(Association::from_expires_in(
        expires_in,
        assoc_handle,
        secret,
        assoc_type,
        now,
    )?)
}

#[cfg(test)]
mod tests {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use chrono::TimeZone;
    use tracing_test::traced_test;

    use super::*;
    use crate::message::OPENID2_NS;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1000, 0).unwrap()
    }

    fn mac_key() -> String {
        STANDARD.encode([3u8; 20])
    }

    fn v2_reply(overrides: &[(&str, Option<&str>)]) -> Message {
        let key = mac_key();
        let mut msg = Message::from_openid_args([
            ("ns", OPENID2_NS),
            ("assoc_type", "HMAC-SHA1"),
            ("assoc_handle", "h1"),
            ("expires_in", "600"),
            ("session_type", "no-encryption"),
            ("mac_key", key.as_str()),
        ])
        .unwrap();
        for (key, value) in overrides {
            match value {
                Some(value) => msg.set_arg(*key, *value),
                None => {
                    msg.del_arg(key);
                }
            }
        }
        msg
    }

    fn plain() -> ConsumerSession {
        ConsumerSession::new(SessionType::NoEncryption)
    }

    #[test]
    fn test_success() {
        let assoc =
            extract_association(&v2_reply(&[]), &plain(), ProtocolVersion::OpenId2, now()).unwrap();
        assert_eq!("h1", assoc.handle);
        assert_eq!(now(), assoc.issued);
        assert_eq!(600, assoc.lifetime);
        assert_eq!("HMAC-SHA1", assoc.assoc_type);
        assert_eq!(&[3u8; 20], assoc.secret());
    }

    #[test]
    fn test_missing_fields() {
        for field in ["assoc_type", "assoc_handle", "expires_in", "session_type"] {
            assert!(matches!(
                extract_association(
                    &v2_reply(&[(field, None)]),
                    &plain(),
                    ProtocolVersion::OpenId2,
                    now()
                ),
                Err(AssociationError::MissingField(missing)) if missing == field
            ));
        }
        let legacy = Message::from_openid_args(
            v2_reply(&[])
                .to_args()
                .into_iter()
                .filter(|(k, _)| k != "ns"),
        )
        .unwrap();
        assert!(matches!(
            extract_association(&legacy, &plain(), ProtocolVersion::OpenId2, now()),
            Err(AssociationError::MissingField("ns"))
        ));
    }

    #[test]
    fn test_invalid_expires_in() {
        for value in ["soon", "-1", "", "9223372036854775807", "2147483648"] {
            assert!(matches!(
                extract_association(
                    &v2_reply(&[("expires_in", Some(value))]),
                    &plain(),
                    ProtocolVersion::OpenId2,
                    now()
                ),
                Err(AssociationError::InvalidExpiresIn(_))
            ));
        }
        assert!(
            extract_association(
                &v2_reply(&[("expires_in", Some(" 60 "))]),
                &plain(),
                ProtocolVersion::OpenId2,
                now()
            )
            .is_ok()
        );
        let longest = extract_association(
            &v2_reply(&[("expires_in", Some("2147483647"))]),
            &plain(),
            ProtocolVersion::OpenId2,
            now(),
        )
        .unwrap();
        assert!(!longest.is_expired(now()));
        assert_eq!(2147483647, longest.expires_in(now()));
    }

    #[test]
    #[traced_test]
    fn test_session_mismatch() {
        let session = ConsumerSession::new(SessionType::DhSha1);
        assert!(matches!(
            extract_association(&v2_reply(&[]), &session, ProtocolVersion::OpenId2, now()),
            Err(AssociationError::SessionMismatch { .. })
        ));
        assert!(logs_contain("Session type mismatch. Expected DH-SHA1, got no-encryption"));
    }

    #[test]
    #[traced_test]
    fn test_unsupported_assoc_type() {
        let err = extract_association(
            &v2_reply(&[("assoc_type", Some("HMAC-MD5"))]),
            &plain(),
            ProtocolVersion::OpenId2,
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, AssociationError::UnsupportedAssocType { .. }));
        assert!(logs_contain("Unsupported assoc_type for session no-encryption returned: HMAC-MD5"));
    }

    #[test]
    fn test_malformed_secret() {
        assert!(matches!(
            extract_association(
                &v2_reply(&[("mac_key", Some("!!!"))]),
                &plain(),
                ProtocolVersion::OpenId2,
                now()
            ),
            Err(AssociationError::MalformedSession { .. })
        ));
    }

    #[test]
    #[traced_test]
    fn test_openid1_session_type() {
        let key = mac_key();
        let reply = Message::from_openid_args([
            ("assoc_type", "HMAC-SHA1"),
            ("assoc_handle", "h1"),
            ("expires_in", "600"),
            ("mac_key", key.as_str()),
        ])
        .unwrap();
        assert!(extract_association(&reply, &plain(), ProtocolVersion::OpenId1, now()).is_ok());
        assert!(!logs_contain("for OpenID 1.X"));

        let mut explicit = reply.clone();
        explicit.set_arg("session_type", "no-encryption");
        assert!(extract_association(&explicit, &plain(), ProtocolVersion::OpenId1, now()).is_ok());
        assert!(logs_contain("OpenID server sent \"no-encryption\" for OpenID 1.X"));

        // Mismatch is terminal for the legacy protocol as well.
        let mut dh = reply.clone();
        dh.set_arg("session_type", "DH-SHA1");
        assert!(matches!(
            extract_association(&dh, &plain(), ProtocolVersion::OpenId1, now()),
            Err(AssociationError::SessionMismatch { .. })
        ));
    }
}
