use anyhow::Result;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::{error, info};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_products_table::Migration),
            Box::new(m20240101_000002_create_lots_table::Migration),
            Box::new(m20240101_000003_create_movements_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_products_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Products::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Products::Gtin)
                                .string_len(14)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Products::Name).string_len(200).not_null())
                        .col(
                            ColumnDef::new(Products::Manufacturer)
                                .string_len(200)
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Products::Status)
                                .string_len(16)
                                .not_null()
                                .default("active"),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .check(Expr::col(Products::Status).is_in(["active", "inactive"]))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_name")
                        .table(Products::Table)
                        .col(Products::Name)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Products {
        Table,
        Id,
        Gtin,
        Name,
        Manufacturer,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_lots_table {

    use super::m20240101_000001_create_products_table::Products;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_lots_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Lots::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Lots::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Lots::ProductId).big_integer().not_null())
                        .col(ColumnDef::new(Lots::LotNumber).string_len(80).not_null())
                        .col(ColumnDef::new(Lots::ExpiryDate).date().not_null())
                        .col(
                            ColumnDef::new(Lots::Stock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .check(Expr::col(Lots::Stock).gte(0))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_lots_product_id")
                                .from(Lots::Table, Lots::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_lots_product_lot_number")
                        .table(Lots::Table)
                        .col(Lots::ProductId)
                        .col(Lots::LotNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_lots_expiry_date")
                        .table(Lots::Table)
                        .col(Lots::ExpiryDate)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Lots::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Lots {
        Table,
        Id,
        ProductId,
        LotNumber,
        ExpiryDate,
        Stock,
    }
}

mod m20240101_000003_create_movements_table {

    use super::m20240101_000002_create_lots_table::Lots;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_movements_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Movements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Movements::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Movements::LotId).big_integer().not_null())
                        .col(
                            ColumnDef::new(Movements::MovementType)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Movements::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(Movements::Reason)
                                .string_len(255)
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Movements::DocumentRef)
                                .string_len(100)
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Movements::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Movements::AppliedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Movements::AppliedBy).string_len(150).null())
                        .col(ColumnDef::new(Movements::StockBefore).integer().null())
                        .col(ColumnDef::new(Movements::StockAfter).integer().null())
                        .check(Expr::col(Movements::Quantity).ne(0))
                        .check(
                            Expr::col(Movements::MovementType).eq("ADJUSTMENT").or(Expr::col(
                                Movements::MovementType,
                            )
                            .is_in(["RECEIPT", "ISSUE"])
                            .and(Expr::col(Movements::Quantity).gt(0))),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_movements_lot_id")
                                .from(Movements::Table, Movements::LotId)
                                .to(Lots::Table, Lots::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_movements_lot_created_at")
                        .table(Movements::Table)
                        .col(Movements::LotId)
                        .col(Movements::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_movements_applied_at")
                        .table(Movements::Table)
                        .col(Movements::AppliedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_movements_applied_by")
                        .table(Movements::Table)
                        .col(Movements::AppliedBy)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Movements::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Movements {
        Table,
        Id,
        LotId,
        MovementType,
        Quantity,
        Reason,
        DocumentRef,
        CreatedAt,
        AppliedAt,
        AppliedBy,
        StockBefore,
        StockAfter,
    }
}

// Database migration CLI runner
pub async fn run_migration(db_url: &str) -> Result<()> {
    info!("Setting up database connection for migrations");

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(1)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;

    info!("Running database migrations");

    match Migrator::up(&db, None).await {
        Ok(_) => {
            info!("Migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Migration failed: {}", e);
            Err(e.into())
        }
    }
}

/// Rolls back every migration.
pub async fn reset_migration(db_url: &str) -> Result<()> {
    let db = Database::connect(ConnectOptions::new(db_url)).await?;
    info!("Rolling back database migrations");
    Migrator::down(&db, None).await?;
    Ok(())
}
