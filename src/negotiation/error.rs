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
use crate::message::MessageError;

#[derive(Error, Debug, PartialEq)]
pub enum NegotiationError {
    /// Association type is not known.
    #[error(transparent)]
    AssocType {
        /// The source of the error.
        #[from]
        source: AssociationDataError,
    },

    /// The association and the session type can not be combined.
    #[error("session type {session_type} does not support association type {assoc_type}")]
    IncompatibleTypes {
        assoc_type: String,
        session_type: String,
    },

    /// `assoc_type:session_type` preference entry can not be parsed.
    #[error("invalid association preference {0:?}, expected assoc_type:session_type")]
    InvalidPreference(String),

    /// Field of the reply is not a valid base64 value.
    #[error("malformed {0} field")]
    MalformedField(&'static str),

    /// Message error.
    #[error(transparent)]
    Message {
        /// The source of the error.
        #[from]
        source: MessageError,
    },

    /// Field of the reply is missing.
    #[error("missing required field {0}")]
    MissingField(&'static str),

    /// Decrypted secret length differs from the hash length.
    #[error("encrypted MAC key is {got} bytes long, {expected} expected")]
    SecretLengthMismatch { expected: usize, got: usize },

    /// Session type is not known.
    #[error("unknown session type {0}")]
    UnknownSessionType(String),
}
