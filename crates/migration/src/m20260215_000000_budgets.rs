use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Budgets {
    Table,
    Id,
    Owner,
    Name,
    Currency,
    TargetAmount,
    CollectedAmount,
    Period,
    Repeat,
    StartOn,
    EndOn,
    CategoryIds,
    Comment,
    Archived,
    Deleted,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Username,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Budgets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Budgets::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Budgets::Owner).string().not_null())
                    .col(ColumnDef::new(Budgets::Name).string().not_null())
                    .col(ColumnDef::new(Budgets::Currency).string_len(3).not_null())
                    .col(ColumnDef::new(Budgets::TargetAmount).string().not_null())
                    .col(
                        ColumnDef::new(Budgets::CollectedAmount)
                            .string()
                            .not_null()
                            .default("0"),
                    )
                    .col(ColumnDef::new(Budgets::Period).string().not_null())
                    .col(
                        ColumnDef::new(Budgets::Repeat)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Budgets::StartOn).date().not_null())
                    // exclusive upper bound
                    .col(ColumnDef::new(Budgets::EndOn).date().not_null())
                    .col(
                        ColumnDef::new(Budgets::CategoryIds)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Budgets::Comment).string())
                    .col(
                        ColumnDef::new(Budgets::Archived)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Budgets::Deleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Budgets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Budgets::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budgets-owner")
                            .from(Budgets::Table, Budgets::Owner)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-budgets-owner")
                    .table(Budgets::Table)
                    .col(Budgets::Owner)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-budgets-archived-end_on")
                    .table(Budgets::Table)
                    .col(Budgets::Archived)
                    .col(Budgets::EndOn)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Budgets::Table).to_owned())
            .await
    }
}
