use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Lookup rows for the task workflow. Ids are referenced by `TaskStatus`.
const STATUSES: [(i32, &str); 4] = [
    (1, "Открыта"),
    (2, "В работе"),
    (3, "Отклонена"),
    (4, "Выполнена"),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Statuses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Statuses::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Statuses::Name).string_len(100).not_null())
                    .to_owned(),
            )
            .await?;

        let mut insert = Query::insert();
        insert
            .into_table(Statuses::Table)
            .columns([Statuses::Id, Statuses::Name]);
        for (id, name) in STATUSES {
            insert.values_panic([id.into(), name.into()]);
        }
        manager.exec_stmt(insert).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Statuses::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Statuses {
    Table,
    Id,
    Name,
}
