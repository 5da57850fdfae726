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

use sea_orm_migration::{prelude::*, schema::*};

use crate::association::MAX_SECRET_LEN;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OidAssociations::Table)
                    .if_not_exists()
                    .col(string_len(OidAssociations::ServerUrl, 2047))
                    .col(string_len(OidAssociations::Handle, 255))
                    .col(
                        ColumnDef::new(OidAssociations::Secret)
                            .var_binary(MAX_SECRET_LEN as u32)
                            .not_null(),
                    )
                    .col(big_integer(OidAssociations::Issued))
                    .col(big_integer(OidAssociations::Lifetime))
                    .col(string_len(OidAssociations::AssocType, 64))
                    .primary_key(
                        Index::create()
                            .name("pk-oid-associations")
                            .col(OidAssociations::ServerUrl)
                            .col(OidAssociations::Handle),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OidNonces::Table)
                    .if_not_exists()
                    .col(string_len(OidNonces::ServerUrl, 2047))
                    .col(big_integer(OidNonces::Timestamp))
                    .col(string_len(OidNonces::Salt, 40))
                    .primary_key(
                        Index::create()
                            .name("pk-oid-nonces")
                            .col(OidNonces::ServerUrl)
                            .col(OidNonces::Timestamp)
                            .col(OidNonces::Salt),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-oid-nonces-timestamp")
                    .table(OidNonces::Table)
                    .col(OidNonces::Timestamp)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OidAssociations::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(OidNonces::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum OidAssociations {
    Table,
    ServerUrl,
    Handle,
    Secret,
    Issued,
    Lifetime,
    AssocType,
}

#[derive(DeriveIden)]
enum OidNonces {
    Table,
    ServerUrl,
    Timestamp,
    Salt,
}
