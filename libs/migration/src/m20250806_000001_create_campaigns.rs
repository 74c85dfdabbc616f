use sea_orm_migration::sea_query::extension::postgres::Type;
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create campaign_status enum
        manager
            .create_type(
                Type::create()
                    .as_enum(CampaignStatus::Enum)
                    .values([
                        CampaignStatus::Draft,
                        CampaignStatus::Scheduled,
                        CampaignStatus::Sending,
                        CampaignStatus::Completed,
                        CampaignStatus::Failed,
                        CampaignStatus::Paused,
                    ])
                    .to_owned(),
            )
            .await?;

        // Create campaigns table
        manager
            .create_table(
                Table::create()
                    .table(Campaigns::Table)
                    .if_not_exists()
                    .col(pk_uuid(Campaigns::Id))
                    .col(uuid(Campaigns::OrganizationId))
                    .col(string(Campaigns::Name))
                    .col(text(Campaigns::MessageTemplate))
                    .col(string(Campaigns::SenderId))
                    .col(timestamp_with_time_zone_null(Campaigns::ScheduledAt))
                    .col(
                        ColumnDef::new(Campaigns::Status)
                            .enumeration(
                                CampaignStatus::Enum,
                                [
                                    CampaignStatus::Draft,
                                    CampaignStatus::Scheduled,
                                    CampaignStatus::Sending,
                                    CampaignStatus::Completed,
                                    CampaignStatus::Failed,
                                    CampaignStatus::Paused,
                                ],
                            )
                            .not_null()
                            .default("draft"),
                    )
                    .col(integer(Campaigns::SentCount).default(0))
                    .col(integer(Campaigns::DeliveredCount).default(0))
                    .col(integer(Campaigns::FailedCount).default(0))
                    .col(integer(Campaigns::SkippedCount).default(0))
                    .col(text_null(Campaigns::ErrorMessage))
                    .col(timestamp_with_time_zone_null(Campaigns::StartedAt))
                    .col(timestamp_with_time_zone_null(Campaigns::CompletedAt))
                    .col(
                        timestamp_with_time_zone(Campaigns::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Campaigns::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Create indexes
        manager
            .create_index(
                Index::create()
                    .name("idx_campaigns_status")
                    .table(Campaigns::Table)
                    .col(Campaigns::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_campaigns_organization_id")
                    .table(Campaigns::Table)
                    .col(Campaigns::OrganizationId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_campaigns_scheduled_at")
                    .table(Campaigns::Table)
                    .col(Campaigns::ScheduledAt)
                    .to_owned(),
            )
            .await?;

        // Add updated_at trigger
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TRIGGER campaigns_touch_updated_at
                    BEFORE UPDATE ON campaigns
                    FOR EACH ROW
                    EXECUTE FUNCTION util.touch_updated_at()
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TRIGGER IF EXISTS campaigns_touch_updated_at ON campaigns")
            .await?;

        manager
            .drop_table(Table::drop().table(Campaigns::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(CampaignStatus::Enum).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Campaigns {
    Table,
    Id,
    OrganizationId,
    Name,
    MessageTemplate,
    SenderId,
    ScheduledAt,
    Status,
    SentCount,
    DeliveredCount,
    FailedCount,
    SkippedCount,
    ErrorMessage,
    StartedAt,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CampaignStatus {
    #[sea_orm(iden = "campaign_status")]
    Enum,
    #[sea_orm(iden = "draft")]
    Draft,
    #[sea_orm(iden = "scheduled")]
    Scheduled,
    #[sea_orm(iden = "sending")]
    Sending,
    #[sea_orm(iden = "completed")]
    Completed,
    #[sea_orm(iden = "failed")]
    Failed,
    #[sea_orm(iden = "paused")]
    Paused,
}
