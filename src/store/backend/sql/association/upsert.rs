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
use sea_orm::sea_query::OnConflict;

use crate::association::Association;
use crate::db::entity::{
    oid_association as db_association, prelude::OidAssociation as DbAssociation,
};
use crate::error::DbContextExt;
use crate::store::backend::error::StoreDatabaseError;

/// Insert the association or replace the one with the same handle.
pub async fn upsert<C: ConnectionTrait>(
    db: &C,
    server_url: &str,
    association: &Association,
) -> Result<(), StoreDatabaseError> {
    let entry = db_association::ActiveModel {
        server_url: Set(server_url.to_string()),
        handle: Set(association.handle.clone()),
        secret: Set(association.secret().to_vec()),
        issued: Set(association.issued.timestamp()),
        lifetime: Set(association.lifetime),
        assoc_type: Set(association.assoc_type.clone()),
    };
    DbAssociation::insert(entry)
        .on_conflict(
            OnConflict::columns([
                db_association::Column::ServerUrl,
                db_association::Column::Handle,
            ])
            .update_columns([
                db_association::Column::Secret,
                db_association::Column::Issued,
                db_association::Column::Lifetime,
                db_association::Column::AssocType,
            ])
            .to_owned(),
        )
        .exec_without_returning(db)
        .await
        .context("storing the association")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Transaction};

    use super::*;

    #[tokio::test]
    async fn test_upsert() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                rows_affected: 1,
                ..Default::default()
            }])
            .into_connection();
        let assoc = Association::new(
            "h1",
            vec![1; 20],
            Utc.timestamp_opt(1000, 0).unwrap(),
            600,
            "HMAC-SHA1",
        )
        .unwrap();

        upsert(&db, "https://idp.example/op", &assoc).await.unwrap();

        assert_eq!(
            db.into_transaction_log(),
            [Transaction::from_sql_and_values(
                DatabaseBackend::Postgres,
                r#"INSERT INTO "oid_associations" ("server_url", "handle", "secret", "issued", "lifetime", "assoc_type") VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT ("server_url", "handle") DO UPDATE SET "secret" = "excluded"."secret", "issued" = "excluded"."issued", "lifetime" = "excluded"."lifetime", "assoc_type" = "excluded"."assoc_type""#,
                [
                    "https://idp.example/op".into(),
                    "h1".into(),
                    vec![1u8; 20].into(),
                    1000i64.into(),
                    600i64.into(),
                    "HMAC-SHA1".into()
                ]
            ),]
        );
    }
}
