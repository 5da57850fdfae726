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

//! # OpenID protocol messages
//!
//! A [Message] is the set of `openid.*` arguments exchanged with the
//! provider, either as a direct (key-value form) request/response or through
//! the browser redirect. Arguments are kept without the `openid.` prefix.
//! Arguments outside of the OpenID namespace (for example the ones the
//! relying party appended to its own `return_to` URL) are kept separately as
//! the "bare" arguments.
//!
//! Extension namespaces (`openid.ns.<alias>`, `openid.<alias>.*`) are carried
//! through as opaque arguments.
use std::collections::BTreeMap;

use thiserror::Error;

pub mod kvform;

/// OpenID 1.0 namespace URI.
pub const OPENID1_NS: &str = "http://openid.net/signon/1.0";
/// OpenID 1.1 namespace URI.
pub const OPENID11_NS: &str = "http://openid.net/signon/1.1";
/// OpenID 2.0 namespace URI.
pub const OPENID2_NS: &str = "http://specs.openid.net/auth/2.0";

/// Prefix of the OpenID arguments in the POST/query form.
const OPENID_PREFIX: &str = "openid.";

/// Message error.
#[derive(Debug, Error, PartialEq)]
pub enum MessageError {
    /// `openid.ns` carries an unknown namespace.
    #[error("invalid OpenID namespace {0}")]
    InvalidNamespace(String),

    /// Key-value form key is not allowed.
    #[error("invalid key-value form key {0:?}")]
    InvalidKey(String),

    /// Key-value form value is not allowed.
    #[error("invalid key-value form value for {0}")]
    InvalidValue(String),

    /// Key-value form line can not be parsed.
    #[error("line {line} is not a key-value pair: {content:?}")]
    MalformedLine {
        /// Line number (starting from 1).
        line: usize,
        /// Line content.
        content: String,
    },
}

/// Protocol version a message is written in.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ProtocolVersion {
    /// Legacy OpenID 1.x (no `openid.ns`, or an OpenID 1 namespace URI).
    OpenId1,
    /// OpenID 2.0.
    #[default]
    OpenId2,
}

impl ProtocolVersion {
    /// Determine the version from the value of `openid.ns`.
    pub fn from_namespace(ns: Option<&str>) -> Result<Self, MessageError> {
        match ns {
            None | Some(OPENID1_NS) | Some(OPENID11_NS) => Ok(Self::OpenId1),
            Some(OPENID2_NS) => Ok(Self::OpenId2),
            Some(other) => Err(MessageError::InvalidNamespace(other.to_string())),
        }
    }

    /// The namespace URI written into outgoing messages.
    pub fn namespace(&self) -> &'static str {
        match self {
            Self::OpenId1 => OPENID1_NS,
            Self::OpenId2 => OPENID2_NS,
        }
    }
}

/// OpenID protocol message.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Message {
    /// Protocol version.
    version: ProtocolVersion,
    /// `openid.*` arguments without the prefix (excluding `ns`).
    args: BTreeMap<String, String>,
    /// Arguments outside of the OpenID namespace.
    bare_args: BTreeMap<String, String>,
}

impl Message {
    /// Empty message of the given protocol version.
    pub fn new(version: ProtocolVersion) -> Self {
        Self {
            version,
            ..Default::default()
        }
    }

    /// Build the message from the `openid.` stripped arguments.
    ///
    /// The `ns` argument selects the protocol version; its absence means
    /// OpenID 1.
    pub fn from_openid_args<I, K, V>(args: I) -> Result<Self, MessageError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut args: BTreeMap<String, String> = args
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let version = ProtocolVersion::from_namespace(args.get("ns").map(String::as_str))?;
        args.remove("ns");
        Ok(Self {
            version,
            args,
            bare_args: BTreeMap::new(),
        })
    }

    /// Build the message from the complete query/POST arguments.
    ///
    /// Arguments with the `openid.` prefix become OpenID arguments, all
    /// others are kept as bare arguments.
    pub fn from_post_args<I, K, V>(args: I) -> Result<Self, MessageError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut openid_args: Vec<(String, String)> = Vec::new();
        let mut bare_args: BTreeMap<String, String> = BTreeMap::new();
        for (key, value) in args {
            let key: String = key.into();
            match key.strip_prefix(OPENID_PREFIX) {
                Some(stripped) => openid_args.push((stripped.to_string(), value.into())),
                None => {
                    bare_args.insert(key, value.into());
                }
            }
        }
        let mut message = Self::from_openid_args(openid_args)?;
        message.bare_args = bare_args;
        Ok(message)
    }

    /// Protocol version of the message.
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Whether the message uses the legacy OpenID 1 namespace.
    pub fn is_openid1(&self) -> bool {
        self.version == ProtocolVersion::OpenId1
    }

    /// Get the OpenID argument.
    pub fn get_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(String::as_str)
    }

    /// Get the bare (non `openid.`) argument.
    pub fn get_bare_arg(&self, key: &str) -> Option<&str> {
        self.bare_args.get(key).map(String::as_str)
    }

    /// Whether the OpenID argument is present.
    pub fn has_key(&self, key: &str) -> bool {
        self.args.contains_key(key)
    }

    /// Set the OpenID argument.
    pub fn set_arg<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.args.insert(key.into(), value.into());
    }

    /// Set the bare argument.
    pub fn set_bare_arg<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.bare_args.insert(key.into(), value.into());
    }

    /// Remove the OpenID argument.
    pub fn del_arg(&mut self, key: &str) -> Option<String> {
        self.args.remove(key)
    }

    /// OpenID arguments including `ns` for OpenID 2 messages, without the
    /// `openid.` prefix.
    pub fn to_args(&self) -> BTreeMap<String, String> {
        let mut args = self.args.clone();
        if self.version == ProtocolVersion::OpenId2 {
            args.insert("ns".into(), OPENID2_NS.into());
        }
        args
    }

    /// Arguments as they are sent in the POST body or the query string.
    pub fn to_post_args(&self) -> BTreeMap<String, String> {
        let mut args: BTreeMap<String, String> = self
            .to_args()
            .into_iter()
            .map(|(k, v)| (format!("{OPENID_PREFIX}{k}"), v))
            .collect();
        args.extend(self.bare_args.clone());
        args
    }

    /// Encode the OpenID arguments in the key-value form.
    pub fn to_kvform(&self) -> Result<String, MessageError> {
        kvform::to_kv(self.to_args())
    }

    /// Decode a key-value form body (direct response).
    pub fn from_kvform(body: &str) -> Result<Self, MessageError> {
        Self::from_openid_args(kvform::from_kv(body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_from_namespace() {
        assert_eq!(
            ProtocolVersion::OpenId1,
            Message::from_openid_args([("mode", "id_res")])
                .unwrap()
                .version()
        );
        assert_eq!(
            ProtocolVersion::OpenId1,
            Message::from_openid_args([("ns", OPENID11_NS)])
                .unwrap()
                .version()
        );
        assert!(
            !Message::from_openid_args([("ns", OPENID2_NS)])
                .unwrap()
                .is_openid1()
        );
        assert_eq!(
            Err(MessageError::InvalidNamespace("urn:bogus".into())),
            Message::from_openid_args([("ns", "urn:bogus")])
        );
    }

    #[test]
    fn test_from_post_args() {
        let msg = Message::from_post_args([
            ("openid.ns", OPENID2_NS),
            ("openid.mode", "id_res"),
            ("openid.claimed_id", "http://x/"),
            ("janrain_nonce", "1970-01-01T00:00:00Zabcdef"),
        ])
        .unwrap();
        assert_eq!(Some("id_res"), msg.get_arg("mode"));
        assert_eq!(Some("http://x/"), msg.get_arg("claimed_id"));
        assert_eq!(None, msg.get_arg("ns"));
        assert_eq!(None, msg.get_arg("janrain_nonce"));
        assert_eq!(
            Some("1970-01-01T00:00:00Zabcdef"),
            msg.get_bare_arg("janrain_nonce")
        );
    }

    #[test]
    fn test_to_post_args() {
        let mut msg = Message::new(ProtocolVersion::OpenId2);
        msg.set_arg("mode", "associate");
        msg.set_bare_arg("return_to_arg", "1");
        let args = msg.to_post_args();
        assert_eq!(Some(&OPENID2_NS.to_string()), args.get("openid.ns"));
        assert_eq!(Some(&"associate".to_string()), args.get("openid.mode"));
        assert_eq!(Some(&"1".to_string()), args.get("return_to_arg"));

        let mut msg = Message::new(ProtocolVersion::OpenId1);
        msg.set_arg("mode", "associate");
        assert!(!msg.to_post_args().contains_key("openid.ns"));
    }

    #[test]
    fn test_kvform_roundtrip_keeps_version() {
        let msg = Message::from_kvform("ns:http://specs.openid.net/auth/2.0\nassoc_handle:h\n")
            .unwrap();
        assert!(!msg.is_openid1());
        assert_eq!(Some("h"), msg.get_arg("assoc_handle"));
        assert_eq!(
            "assoc_handle:h\nns:http://specs.openid.net/auth/2.0\n",
            msg.to_kvform().unwrap()
        );
    }
}
