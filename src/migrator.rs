use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_catalog_tables::Migration),
            Box::new(m20250101_000002_create_order_tables::Migration),
            Box::new(m20250101_000003_create_sales_tables::Migration),
            Box::new(m20250101_000004_create_cashier_tables::Migration),
        ]
    }
}

mod m20250101_000001_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Establishments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Establishments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Establishments::Name).string().not_null())
                        .col(ColumnDef::new(Establishments::Slug).string().not_null())
                        .col(
                            ColumnDef::new(Establishments::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Establishments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Establishments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_establishments_slug")
                        .table(Establishments::Table)
                        .col(Establishments::Slug)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::EstablishmentId).uuid().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Price).decimal().not_null())
                        .col(ColumnDef::new(Products::UnitCost).decimal().null())
                        .col(
                            ColumnDef::new(Products::Available)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_products_establishment")
                        .table(Products::Table)
                        .col(Products::EstablishmentId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PaymentMethods::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PaymentMethods::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentMethods::EstablishmentId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentMethods::Name).string().not_null())
                        .col(ColumnDef::new(PaymentMethods::Kind).string().not_null())
                        .col(
                            ColumnDef::new(PaymentMethods::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(PaymentMethods::FeePercentage)
                                .decimal()
                                .null(),
                        )
                        .col(ColumnDef::new(PaymentMethods::FixedFee).decimal().null())
                        .col(
                            ColumnDef::new(PaymentMethods::RequiresChange)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(PaymentMethods::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentMethods::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_payment_methods_establishment")
                        .table(PaymentMethods::Table)
                        .col(PaymentMethods::EstablishmentId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PaymentMethods::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Establishments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Establishments {
        Table,
        Id,
        Name,
        Slug,
        Active,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        EstablishmentId,
        Name,
        Price,
        UnitCost,
        Available,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum PaymentMethods {
        Table,
        Id,
        EstablishmentId,
        Name,
        Kind,
        Active,
        FeePercentage,
        FixedFee,
        RequiresChange,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000002_create_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::EstablishmentId).uuid().not_null())
                        .col(ColumnDef::new(Orders::CustomerId).uuid().null())
                        .col(ColumnDef::new(Orders::WaiterId).uuid().null())
                        .col(ColumnDef::new(Orders::TableId).uuid().null())
                        .col(ColumnDef::new(Orders::OrderType).string().not_null())
                        .col(ColumnDef::new(Orders::Source).string().not_null())
                        .col(ColumnDef::new(Orders::ExternalId).string().null())
                        .col(ColumnDef::new(Orders::OrderNumber).integer().not_null())
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(ColumnDef::new(Orders::Subtotal).decimal().not_null())
                        .col(ColumnDef::new(Orders::Discount).decimal().not_null())
                        .col(ColumnDef::new(Orders::DeliveryFee).decimal().not_null())
                        .col(ColumnDef::new(Orders::ServiceFee).decimal().not_null())
                        .col(ColumnDef::new(Orders::Total).decimal().not_null())
                        .col(ColumnDef::new(Orders::Notes).string().null())
                        .col(
                            ColumnDef::new(Orders::DeliveredAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_orders_establishment_created")
                        .table(Orders::Table)
                        .col(Orders::EstablishmentId)
                        .col(Orders::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_orders_establishment_external")
                        .table(Orders::Table)
                        .col(Orders::EstablishmentId)
                        .col(Orders::ExternalId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductName).string().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(ColumnDef::new(OrderItems::UnitPrice).decimal().not_null())
                        .col(ColumnDef::new(OrderItems::UnitCost).decimal().null())
                        .col(ColumnDef::new(OrderItems::Discount).decimal().not_null())
                        .col(ColumnDef::new(OrderItems::Subtotal).decimal().not_null())
                        .col(ColumnDef::new(OrderItems::Total).decimal().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_order_items_order")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderStatusHistory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderStatusHistory::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderStatusHistory::OrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderStatusHistory::Status)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderStatusHistory::Note).string().null())
                        .col(
                            ColumnDef::new(OrderStatusHistory::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_order_status_history_order")
                        .table(OrderStatusHistory::Table)
                        .col(OrderStatusHistory::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderStatusHistory::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        EstablishmentId,
        CustomerId,
        WaiterId,
        TableId,
        OrderType,
        Source,
        ExternalId,
        OrderNumber,
        Status,
        Subtotal,
        Discount,
        DeliveryFee,
        ServiceFee,
        Total,
        Notes,
        DeliveredAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        ProductName,
        Quantity,
        UnitPrice,
        UnitCost,
        Discount,
        Subtotal,
        Total,
    }

    #[derive(DeriveIden)]
    enum OrderStatusHistory {
        Table,
        Id,
        OrderId,
        Status,
        Note,
        CreatedAt,
    }
}

mod m20250101_000003_create_sales_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_sales_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Sales::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Sales::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Sales::OrderId).uuid().not_null())
                        .col(ColumnDef::new(Sales::EstablishmentId).uuid().not_null())
                        .col(ColumnDef::new(Sales::SellerId).uuid().null())
                        .col(ColumnDef::new(Sales::Subtotal).decimal().not_null())
                        .col(ColumnDef::new(Sales::Discount).decimal().not_null())
                        .col(ColumnDef::new(Sales::Total).decimal().not_null())
                        .col(ColumnDef::new(Sales::Paid).decimal().not_null())
                        .col(ColumnDef::new(Sales::Change).decimal().not_null())
                        .col(ColumnDef::new(Sales::PaymentStatus).string().not_null())
                        .col(
                            ColumnDef::new(Sales::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Sales::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            // One sale per order
            manager
                .create_index(
                    Index::create()
                        .name("idx_sales_order")
                        .table(Sales::Table)
                        .col(Sales::OrderId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Payments::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Payments::SaleId).uuid().not_null())
                        .col(ColumnDef::new(Payments::PaymentMethodId).uuid().not_null())
                        .col(ColumnDef::new(Payments::Amount).decimal().not_null())
                        .col(ColumnDef::new(Payments::Status).string().not_null())
                        .col(ColumnDef::new(Payments::TransactionId).string().null())
                        .col(
                            ColumnDef::new(Payments::AuthorizationCode)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Payments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_payments_sale")
                        .table(Payments::Table)
                        .col(Payments::SaleId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Sales::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Sales {
        Table,
        Id,
        OrderId,
        EstablishmentId,
        SellerId,
        Subtotal,
        Discount,
        Total,
        Paid,
        Change,
        PaymentStatus,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Payments {
        Table,
        Id,
        SaleId,
        PaymentMethodId,
        Amount,
        Status,
        TransactionId,
        AuthorizationCode,
        CreatedAt,
    }
}

mod m20250101_000004_create_cashier_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000004_create_cashier_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CashierSessions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CashierSessions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CashierSessions::EstablishmentId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CashierSessions::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(CashierSessions::OpeningAmount)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CashierSessions::ClosingAmount)
                                .decimal()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(CashierSessions::ExpectedAmount)
                                .decimal()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(CashierSessions::Difference)
                                .decimal()
                                .null(),
                        )
                        .col(ColumnDef::new(CashierSessions::Notes).string().null())
                        .col(
                            ColumnDef::new(CashierSessions::OpenedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CashierSessions::ClosedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_cashier_sessions_user")
                        .table(CashierSessions::Table)
                        .col(CashierSessions::UserId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CashMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CashMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CashMovements::SessionId).uuid().not_null())
                        .col(ColumnDef::new(CashMovements::Kind).string().not_null())
                        .col(ColumnDef::new(CashMovements::Amount).decimal().not_null())
                        .col(ColumnDef::new(CashMovements::Reason).string().not_null())
                        .col(
                            ColumnDef::new(CashMovements::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_cash_movements_session")
                        .table(CashMovements::Table)
                        .col(CashMovements::SessionId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CashMovements::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(CashierSessions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum CashierSessions {
        Table,
        Id,
        EstablishmentId,
        UserId,
        OpeningAmount,
        ClosingAmount,
        ExpectedAmount,
        Difference,
        Notes,
        OpenedAt,
        ClosedAt,
    }

    #[derive(DeriveIden)]
    enum CashMovements {
        Table,
        Id,
        SessionId,
        Kind,
        Amount,
        Reason,
        CreatedAt,
    }
}
