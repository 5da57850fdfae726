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

//! # Error
//!
//! Errors that can occur while processing OpenID messages on the relying
//! party side.
use sea_orm::SqlErr;
use thiserror::Error;

use crate::discovery::error::DiscoveryError;
use crate::message::MessageError;
use crate::negotiation::error::NegotiationError;
use crate::nonce::NonceError;
use crate::requester::error::{AssociationError, TransportError};
use crate::store::error::StoreProviderError;

/// OpenID relying party error.
#[derive(Debug, Error)]
pub enum OpenIdError {
    /// Association establishment error.
    #[error(transparent)]
    Association {
        /// The source of the error.
        #[from]
        source: AssociationError,
    },

    /// Configuration error.
    #[error(transparent)]
    Config {
        /// The source of the error.
        #[from]
        source: eyre::Report,
    },

    /// Discovery verification error.
    #[error(transparent)]
    Discovery {
        /// The source of the error.
        #[from]
        source: DiscoveryError,
    },

    /// Message decoding error.
    #[error(transparent)]
    Message {
        /// The source of the error.
        #[from]
        source: MessageError,
    },

    /// Session negotiation error.
    #[error(transparent)]
    Negotiation {
        /// The source of the error.
        #[from]
        source: NegotiationError,
    },

    /// Nonce could not be parsed.
    #[error(transparent)]
    Nonce {
        /// The source of the error.
        #[from]
        source: NonceError,
    },

    /// Positive assertion carries no nonce.
    #[error("nonce missing from the response")]
    NonceMissing,

    /// Nonce was already used or its timestamp is outside of the allowed
    /// skew.
    #[error("nonce already used or out of range")]
    NonceRejected,

    /// Store error.
    #[error(transparent)]
    Store {
        /// The source of the error.
        #[from]
        source: StoreProviderError,
    },

    /// Transport error.
    #[error(transparent)]
    Transport {
        /// The source of the error.
        #[from]
        source: TransportError,
    },
}

/// Failure classification independent of the component that raised it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Configuration problem.
    Configuration,
    /// Re-discovery did not confirm the asserted endpoint.
    DiscoveryMismatch,
    /// Missing, non-numeric or structurally invalid field.
    MalformedResponse,
    /// Nonce reuse or timestamp outside of the skew window.
    ReplayOrSkewViolation,
    /// Reply session type differs from the requested one.
    SessionMismatch,
    /// Backend I/O or constraint failure.
    StorageFailure,
    /// Network failure or timeout talking to the provider.
    Transport,
    /// Reply association type is not usable with the session.
    TypeMismatch,
    /// Provider rejected the requested association/session type.
    UnsupportedType,
}

impl OpenIdError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Association { source } => source.kind(),
            Self::Config { .. } => ErrorKind::Configuration,
            Self::Discovery { source } => source.kind(),
            Self::Message { .. }
            | Self::Negotiation { .. }
            | Self::Nonce { .. }
            | Self::NonceMissing => ErrorKind::MalformedResponse,
            Self::NonceRejected => ErrorKind::ReplayOrSkewViolation,
            Self::Store { .. } => ErrorKind::StorageFailure,
            Self::Transport { .. } => ErrorKind::Transport,
        }
    }
}

/// Builder error.
///
/// Returned by the `derive_builder` generated builders when a required field
/// is not set.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BuilderError(String);

impl From<derive_builder::UninitializedFieldError> for BuilderError {
    fn from(ufe: derive_builder::UninitializedFieldError) -> Self {
        Self(ufe.to_string())
    }
}

impl From<String> for BuilderError {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Database error with the operation context.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Unique or foreign key constraint violation.
    #[error("{message}")]
    Conflict {
        /// The error message.
        message: String,
        /// The error context.
        context: String,
    },

    /// Other SQL level error.
    #[error("{message}")]
    Sql {
        /// The error message.
        message: String,
        /// The error context.
        context: String,
    },

    /// Database error.
    #[error("database error while {context}")]
    Database {
        /// The source of the error.
        source: sea_orm::DbErr,
        /// The error context.
        context: String,
    },
}

impl DatabaseError {
    /// Whether the error is a constraint violation.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Convert the DB error into the [DatabaseError] with the context
/// information.
///
/// The driver specific error shape is classified here once so that the
/// backends only deal with [DatabaseError] variants.
pub fn db_err(e: sea_orm::DbErr, context: &str) -> DatabaseError {
    e.sql_err().map_or_else(
        || DatabaseError::Database {
            source: e,
            context: context.to_string(),
        },
        |err| match err {
            SqlErr::UniqueConstraintViolation(descr) => DatabaseError::Conflict {
                message: descr.to_string(),
                context: context.to_string(),
            },
            SqlErr::ForeignKeyConstraintViolation(descr) => DatabaseError::Conflict {
                message: descr.to_string(),
                context: context.to_string(),
            },
            other => DatabaseError::Sql {
                message: other.to_string(),
                context: context.to_string(),
            },
        },
    )
}

/// Attach the operation context to the database results.
pub trait DbContextExt<T> {
    /// Convert the error into the [DatabaseError] describing what was being
    /// done.
    fn context(self, context: &str) -> Result<T, DatabaseError>;
}

impl<T> DbContextExt<T> for Result<T, sea_orm::DbErr> {
    fn context(self, context: &str) -> Result<T, DatabaseError> {
        self.map_err(|err| db_err(err, context))
    }
}
