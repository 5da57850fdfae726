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

/// Delete associations with `issued + lifetime < now`.
pub async fn cleanup<C: ConnectionTrait>(
    db: &C,
    now: DateTime<Utc>,
) -> Result<u64, StoreDatabaseError> {
    Ok(DbAssociation::delete_many()
        .filter(
            Expr::expr(
                Expr::col(db_association::Column::Issued)
                    .add(Expr::col(db_association::Column::Lifetime)),
            )
            .lt(now.timestamp()),
        )
        .exec(db)
        .await
        .context("removing expired associations")?
        .rows_affected)
}
