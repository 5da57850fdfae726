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

use sea_orm::ConnectionTrait;
use sea_orm::entity::*;

use crate::db::entity::{oid_nonce as db_nonce, prelude::OidNonce as DbNonce};
use crate::error::DbContextExt;
use crate::store::backend::error::StoreDatabaseError;

/// Record the nonce.
///
/// A nonce already present violates the primary key and is reported as
/// [crate::error::DatabaseError::Conflict].
pub async fn create<C: ConnectionTrait>(
    db: &C,
    server_url: &str,
    timestamp: i64,
    salt: &str,
) -> Result<(), StoreDatabaseError> {
    let entry = db_nonce::ActiveModel {
        server_url: Set(server_url.to_string()),
        timestamp: Set(timestamp),
        salt: Set(salt.to_string()),
    };
    DbNonce::insert(entry)
        .exec_without_returning(db)
        .await
        .context("recording the nonce")?;
    Ok(())
}
