use sea_orm_migration::sea_query::extension::postgres::Type;
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create message_direction enum
        manager
            .create_type(
                Type::create()
                    .as_enum(MessageDirection::Enum)
                    .values([MessageDirection::Outbound, MessageDirection::Inbound])
                    .to_owned(),
            )
            .await?;

        // Create conversations table
        manager
            .create_table(
                Table::create()
                    .table(Conversations::Table)
                    .if_not_exists()
                    .col(pk_uuid(Conversations::Id))
                    .col(uuid(Conversations::OrganizationId))
                    .col(string(Conversations::ContactNumber))
                    .col(timestamp_with_time_zone_null(Conversations::LastMessageAt))
                    .col(
                        timestamp_with_time_zone(Conversations::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Conversations::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // One conversation per (organization, contact number)
        manager
            .create_index(
                Index::create()
                    .name("uq_conversations_org_contact")
                    .table(Conversations::Table)
                    .col(Conversations::OrganizationId)
                    .col(Conversations::ContactNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create messages table
        manager
            .create_table(
                Table::create()
                    .table(Messages::Table)
                    .if_not_exists()
                    .col(pk_uuid(Messages::Id))
                    .col(uuid(Messages::ConversationId))
                    .col(
                        ColumnDef::new(Messages::Direction)
                            .enumeration(
                                MessageDirection::Enum,
                                [MessageDirection::Outbound, MessageDirection::Inbound],
                            )
                            .not_null(),
                    )
                    .col(text(Messages::Body))
                    .col(string_null(Messages::ProviderMessageId))
                    .col(integer(Messages::Segments).default(1))
                    .col(
                        timestamp_with_time_zone(Messages::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_messages_conversation_id")
                            .from(Messages::Table, Messages::ConversationId)
                            .to(Conversations::Table, Conversations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_messages_conversation_id")
                    .table(Messages::Table)
                    .col(Messages::ConversationId)
                    .to_owned(),
            )
            .await?;

        // Create opt_outs table
        manager
            .create_table(
                Table::create()
                    .table(OptOuts::Table)
                    .if_not_exists()
                    .col(pk_uuid(OptOuts::Id))
                    .col(uuid(OptOuts::OrganizationId))
                    .col(string(OptOuts::PhoneNumber))
                    .col(
                        timestamp_with_time_zone(OptOuts::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Row presence is the opt-out flag, so the pair must be unique
        manager
            .create_index(
                Index::create()
                    .name("uq_opt_outs_org_number")
                    .table(OptOuts::Table)
                    .col(OptOuts::OrganizationId)
                    .col(OptOuts::PhoneNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Add updated_at trigger for conversations (messages are append-only)
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TRIGGER conversations_touch_updated_at
                    BEFORE UPDATE ON conversations
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
                "DROP TRIGGER IF EXISTS conversations_touch_updated_at ON conversations",
            )
            .await?;

        manager
            .drop_table(Table::drop().table(OptOuts::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Messages::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Conversations::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(MessageDirection::Enum).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Conversations {
    Table,
    Id,
    OrganizationId,
    ContactNumber,
    LastMessageAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Messages {
    Table,
    Id,
    ConversationId,
    Direction,
    Body,
    ProviderMessageId,
    Segments,
    CreatedAt,
}

#[derive(DeriveIden)]
enum OptOuts {
    Table,
    Id,
    OrganizationId,
    PhoneNumber,
    CreatedAt,
}

#[derive(DeriveIden)]
enum MessageDirection {
    #[sea_orm(iden = "message_direction")]
    Enum,
    #[sea_orm(iden = "outbound")]
    Outbound,
    #[sea_orm(iden = "inbound")]
    Inbound,
}
