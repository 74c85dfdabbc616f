use sea_orm_migration::sea_query::extension::postgres::Type;
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create recipient_status enum
        manager
            .create_type(
                Type::create()
                    .as_enum(RecipientStatus::Enum)
                    .values([
                        RecipientStatus::Pending,
                        RecipientStatus::Sending,
                        RecipientStatus::Sent,
                        RecipientStatus::Failed,
                        RecipientStatus::Skipped,
                    ])
                    .to_owned(),
            )
            .await?;

        // Create skip_reason enum
        manager
            .create_type(
                Type::create()
                    .as_enum(SkipReason::Enum)
                    .values([SkipReason::OptedOut])
                    .to_owned(),
            )
            .await?;

        // Create broadcast_recipients table
        manager
            .create_table(
                Table::create()
                    .table(BroadcastRecipients::Table)
                    .if_not_exists()
                    .col(pk_uuid(BroadcastRecipients::Id))
                    .col(uuid(BroadcastRecipients::CampaignId))
                    .col(string(BroadcastRecipients::Destination))
                    .col(string_null(BroadcastRecipients::DisplayName))
                    .col(json_binary_null(BroadcastRecipients::Variables))
                    .col(
                        ColumnDef::new(BroadcastRecipients::Status)
                            .enumeration(
                                RecipientStatus::Enum,
                                [
                                    RecipientStatus::Pending,
                                    RecipientStatus::Sending,
                                    RecipientStatus::Sent,
                                    RecipientStatus::Failed,
                                    RecipientStatus::Skipped,
                                ],
                            )
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(BroadcastRecipients::SkipReason)
                            .enumeration(SkipReason::Enum, [SkipReason::OptedOut])
                            .null(),
                    )
                    .col(text_null(BroadcastRecipients::ErrorMessage))
                    .col(uuid_null(BroadcastRecipients::MessageId))
                    .col(integer(BroadcastRecipients::AttemptCount).default(0))
                    .col(timestamp_with_time_zone_null(
                        BroadcastRecipients::LastAttemptAt,
                    ))
                    .col(
                        timestamp_with_time_zone(BroadcastRecipients::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(BroadcastRecipients::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_broadcast_recipients_campaign_id")
                            .from(
                                BroadcastRecipients::Table,
                                BroadcastRecipients::CampaignId,
                            )
                            .to(Campaigns::Table, Campaigns::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create indexes. Claiming filters on (campaign_id, status) and orders
        // by insertion; the reaper scans (status, last_attempt_at).
        manager
            .create_index(
                Index::create()
                    .name("idx_broadcast_recipients_campaign_id")
                    .table(BroadcastRecipients::Table)
                    .col(BroadcastRecipients::CampaignId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_broadcast_recipients_campaign_status")
                    .table(BroadcastRecipients::Table)
                    .col(BroadcastRecipients::CampaignId)
                    .col(BroadcastRecipients::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_broadcast_recipients_status_last_attempt")
                    .table(BroadcastRecipients::Table)
                    .col(BroadcastRecipients::Status)
                    .col(BroadcastRecipients::LastAttemptAt)
                    .to_owned(),
            )
            .await?;

        // Add updated_at trigger
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TRIGGER broadcast_recipients_touch_updated_at
                    BEFORE UPDATE ON broadcast_recipients
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
            .execute_unprepared(
                "DROP TRIGGER IF EXISTS broadcast_recipients_touch_updated_at ON broadcast_recipients",
            )
            .await?;

        manager
            .drop_table(Table::drop().table(BroadcastRecipients::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(SkipReason::Enum).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(RecipientStatus::Enum).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum BroadcastRecipients {
    Table,
    Id,
    CampaignId,
    Destination,
    DisplayName,
    Variables,
    Status,
    SkipReason,
    ErrorMessage,
    MessageId,
    AttemptCount,
    LastAttemptAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Campaigns {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum RecipientStatus {
    #[sea_orm(iden = "recipient_status")]
    Enum,
    #[sea_orm(iden = "pending")]
    Pending,
    #[sea_orm(iden = "sending")]
    Sending,
    #[sea_orm(iden = "sent")]
    Sent,
    #[sea_orm(iden = "failed")]
    Failed,
    #[sea_orm(iden = "skipped")]
    Skipped,
}

#[derive(DeriveIden)]
enum SkipReason {
    #[sea_orm(iden = "skip_reason")]
    Enum,
    #[sea_orm(iden = "opted_out")]
    OptedOut,
}
