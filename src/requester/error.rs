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

use crate::association::AssociationDataError;
use crate::error::ErrorKind;
use crate::message::{Message, MessageError};
use crate::negotiation::error::NegotiationError;
use crate::store::error::StoreProviderError;

/// Error code of the provider rejecting the association or session type.
pub const UNSUPPORTED_TYPE: &str = "unsupported-type";

/// Transport error.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Provider can not be reached.
    #[error("connection to {url} failed: {message}")]
    Connection { url: String, message: String },

    /// Provider replied with an unexpected HTTP status.
    #[error("unexpected HTTP status {status} from {url}")]
    Http { url: String, status: u16 },

    /// Reply body is not a valid message.
    #[error(transparent)]
    Message {
        /// The source of the error.
        #[from]
        source: MessageError,
    },
}

/// Error reply of the provider to a direct request.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerError {
    /// Human readable `error` field.
    pub error_text: String,
    /// Machine readable `error_code` field.
    pub error_code: Option<String>,
    /// Complete reply.
    pub message: Message,
}

impl ServerError {
    pub fn from_message(message: Message) -> Self {
        Self {
            error_text: message.get_arg("error").unwrap_or_default().to_string(),
            error_code: message.get_arg("error_code").map(String::from),
            message,
        }
    }

    /// Whether the provider rejected the requested types.
    pub fn is_unsupported_type(&self) -> bool {
        self.error_code.as_deref() == Some(UNSUPPORTED_TYPE)
    }
}

/// Association establishment error.
#[derive(Debug, Error)]
pub enum AssociationError {
    /// Association data can not be constructed.
    #[error(transparent)]
    Association {
        /// The source of the error.
        #[from]
        source: AssociationDataError,
    },

    /// Provider refused the type it suggested itself.
    #[error(
        "server {server_url} refused its suggested association type: session_type={session_type}, assoc_type={assoc_type}"
    )]
    FallbackRefused {
        server_url: String,
        assoc_type: String,
        session_type: String,
    },

    /// Provider suggested a pair that is not allowed.
    #[error(
        "server sent unsupported session/association type: session_type={session_type}, assoc_type={assoc_type}"
    )]
    FallbackNotAllowed {
        assoc_type: String,
        session_type: String,
    },

    /// `expires_in` is not a non negative integer.
    #[error("invalid expires_in field: {0}")]
    InvalidExpiresIn(String),

    /// Secret can not be recovered from the reply.
    #[error("malformed response for {session_type} session: {source}")]
    MalformedSession {
        session_type: String,
        /// The source of the error.
        source: NegotiationError,
    },

    /// Endpoint does not name the provider URL.
    #[error("endpoint has no server url")]
    MissingServerUrl,

    /// Required reply field is missing.
    #[error("missing required field {0}")]
    MissingField(&'static str),

    /// Nothing to propose to the provider.
    #[error("no association type is allowed")]
    NoAllowedType,

    /// Provider rejected the types without suggesting others.
    #[error(
        "server responded with unsupported association session but did not supply a fallback"
    )]
    NoFallback,

    /// Provider replied with an error.
    #[error("server error when requesting an association from {server_url}: {}", error.error_text)]
    Server {
        server_url: String,
        error: ServerError,
    },

    /// Reply session type differs from the requested one.
    #[error("session type mismatch. Expected {expected}, got {got}")]
    SessionMismatch { expected: String, got: String },

    /// Association could not be persisted.
    #[error(transparent)]
    Store {
        /// The source of the error.
        #[from]
        source: StoreProviderError,
    },

    /// Provider did not reply in time.
    #[error("association request to {server_url} timed out after {seconds} seconds")]
    Timeout { server_url: String, seconds: u64 },

    /// Exchange with the provider failed.
    #[error(transparent)]
    Transport {
        /// The source of the error.
        #[from]
        source: TransportError,
    },

    /// Reply association type can not be used with the session.
    #[error("unsupported assoc_type for session {session_type} returned: {assoc_type}")]
    UnsupportedAssocType {
        assoc_type: String,
        session_type: String,
    },
}

impl AssociationError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Server { error, .. } if error.is_unsupported_type() => ErrorKind::UnsupportedType,
            Self::FallbackNotAllowed { .. } | Self::FallbackRefused { .. } | Self::NoFallback => {
                ErrorKind::UnsupportedType
            }
            Self::Association { .. }
            | Self::InvalidExpiresIn(_)
            | Self::MalformedSession { .. }
            | Self::MissingField(_)
            | Self::Server { .. } => ErrorKind::MalformedResponse,
            Self::MissingServerUrl | Self::NoAllowedType => ErrorKind::Configuration,
            Self::SessionMismatch { .. } => ErrorKind::SessionMismatch,
            Self::Store { .. } => ErrorKind::StorageFailure,
            Self::Timeout { .. } | Self::Transport { .. } => ErrorKind::Transport,
            Self::UnsupportedAssocType { .. } => ErrorKind::TypeMismatch,
        }
    }
}
