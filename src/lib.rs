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

//! # OpenID relying party core
//!
//! This crate implements the parts of an OpenID 2.0 (and legacy 1.x) relying
//! party where the protocol and security work lives:
//!
//! - establishing an association (a shared MAC secret) with an OpenID
//!   provider, optionally protected in transit by a Diffie-Hellman key
//!   agreement, including the single `unsupported-type` fallback retry;
//!
//! - persisting associations and single-use response nonces through a
//!   pluggable [store](crate::store) with in-memory, file and SQL backends;
//!
//! - verifying that an identity assertion returned through the browser
//!   matches the previously discovered service endpoint, or re-running
//!   discovery when it does not.
//!
//! HTTP transport and identifier discovery are not part of the crate. They
//! are consumed through the [Transport](crate::requester::Transport) and
//! [Discoverer](crate::discovery::Discoverer) traits, which the embedding
//! application implements with the client of its choice.
//!
//! The [Consumer](crate::consumer::Consumer) ties the components together the
//! way a sign-on flow uses them, but every component can be used on its own.

pub mod association;
pub mod common;
pub mod config;
pub mod consumer;
pub mod db;
pub mod db_migration;
pub mod discovery;
pub mod error;
pub mod message;
pub mod negotiation;
pub mod nonce;
pub mod plugin_manager;
pub mod requester;
pub mod store;

pub use association::Association;
pub use consumer::Consumer;
pub use error::OpenIdError;
