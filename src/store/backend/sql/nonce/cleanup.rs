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
use sea_orm::query::*;

use crate::db::entity::{oid_nonce as db_nonce, prelude::OidNonce as DbNonce};
use crate::error::DbContextExt;
use crate::store::backend::error::StoreDatabaseError;

/// Delete nonces with the timestamp before the cutoff.
pub async fn cleanup<C: ConnectionTrait>(db: &C, cutoff: i64) -> Result<u64, StoreDatabaseError> {
    Ok(DbNonce::delete_many()
        .filter(db_nonce::Column::Timestamp.lt(cutoff))
        .exec(db)
        .await
        .context("removing expired nonces")?
        .rows_affected)
}
