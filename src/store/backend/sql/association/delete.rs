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

use chrono::{DateTime, Utc};
use sea_orm::ConnectionTrait;
use sea_orm::entity::*;
use sea_orm::query::*;
use sea_orm::sea_query::Expr;

use crate::db::entity::{
    oid_association as db_association, prelude::OidAssociation as DbAssociation,
};
use crate::error::DbContextExt;
use crate::store::backend::error::StoreDatabaseError;

/// Delete the association. Returns the number of the deleted rows.
pub async fn delete<C: ConnectionTrait>(
    db: &C,
    server_url: &str,
    handle: &str,
) -> Result<u64, StoreDatabaseError> {
    Ok(DbAssociation::delete_many()
        .filter(db_association::Column::ServerUrl.eq(server_url))
        .filter(db_association::Column::Handle.eq(handle))
        .exec(db)
        .await
        .context("deleting the association")?
        .rows_affected)
}

/// Delete the association only when it is expired at `now`.
///
/// The record may have been replaced by a fresh one after it was read, the
/// expiry is therefore checked again by the statement itself.
pub async fn delete_expired<C: ConnectionTrait>(
    db: &C,
    server_url: &str,
    handle: &str,
    now: DateTime<Utc>,
) -> Result<u64, StoreDatabaseError> {
    Ok(DbAssociation::delete_many()
        .filter(db_association::Column::ServerUrl.eq(server_url))
        .filter(db_association::Column::Handle.eq(handle))
        .filter(
            Expr::expr(
                Expr::col(db_association::Column::Issued)
                    .add(Expr::col(db_association::Column::Lifetime)),
            )
            .lte(now.timestamp()),
        )
        .exec(db)
        .await
        .context("deleting the expired association")?
        .rows_affected)
}
