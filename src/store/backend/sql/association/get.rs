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

use crate::db::entity::{
    oid_association as db_association, prelude::OidAssociation as DbAssociation,
};
use crate::error::DbContextExt;
use crate::store::backend::error::StoreDatabaseError;

/// Get the association record by the handle.
pub async fn get<C: ConnectionTrait>(
    db: &C,
    server_url: &str,
    handle: &str,
) -> Result<Option<db_association::Model>, StoreDatabaseError> {
    Ok(
        DbAssociation::find_by_id((server_url.to_string(), handle.to_string()))
            .one(db)
            .await
            .context("fetching the association")?,
    )
}

/// List association records of the server, most recently issued first.
pub async fn list<C: ConnectionTrait>(
    db: &C,
    server_url: &str,
) -> Result<Vec<db_association::Model>, StoreDatabaseError> {
    Ok(DbAssociation::find()
        .filter(db_association::Column::ServerUrl.eq(server_url))
        .order_by_desc(db_association::Column::Issued)
        .order_by_desc(db_association::Column::Handle)
        .all(db)
        .await
        .context("listing associations of the server")?)
}
