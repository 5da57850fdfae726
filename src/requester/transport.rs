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

use std::fmt::Debug;

use async_trait::async_trait;

use crate::message::Message;
use crate::requester::error::TransportError;

/// Direct communication with the provider.
///
/// Implementations POST the request to the provider and decode the
/// key-value form body. Error replies (HTTP 400 with an `error` field) are
/// returned as a [Message] as well; only failures to obtain a message are
/// reported as [TransportError].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn exchange<'a>(
        &self,
        server_url: &'a str,
        request: &'a Message,
    ) -> Result<Message, TransportError>;
}
