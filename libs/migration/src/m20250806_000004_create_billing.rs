use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create usage_events table (append-only billing ledger)
        manager
            .create_table(
                Table::create()
                    .table(UsageEvents::Table)
                    .if_not_exists()
                    .col(pk_uuid(UsageEvents::Id))
                    .col(uuid(UsageEvents::OrganizationId))
                    .col(uuid(UsageEvents::CampaignId))
                    .col(uuid(UsageEvents::RecipientId))
                    .col(uuid_null(UsageEvents::MessageId))
                    .col(big_integer(UsageEvents::UnitCostCents))
                    .col(
                        timestamp_with_time_zone(UsageEvents::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_usage_events_organization_id")
                    .table(UsageEvents::Table)
                    .col(UsageEvents::OrganizationId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_usage_events_campaign_id")
                    .table(UsageEvents::Table)
                    .col(UsageEvents::CampaignId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UsageEvents::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum UsageEvents {
    Table,
    Id,
    OrganizationId,
    CampaignId,
    RecipientId,
    MessageId,
    UnitCostCents,
    CreatedAt,
}
