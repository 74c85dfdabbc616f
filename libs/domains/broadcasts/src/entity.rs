//! Sea-ORM entities for the broadcast tables.
//!
//! One submodule per table; each entity converts into its domain
//! counterpart in [`crate::models`].

pub mod campaign {
    use crate::models::{Campaign, CampaignStatus, CreateCampaign};
    use sea_orm::ActiveValue::Set;
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "campaigns")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub organization_id: Uuid,
        pub name: String,
        #[sea_orm(column_type = "Text")]
        pub message_template: String,
        pub sender_id: String,
        pub scheduled_at: Option<DateTimeWithTimeZone>,
        pub status: CampaignStatus,
        pub sent_count: i32,
        pub delivered_count: i32,
        pub failed_count: i32,
        pub skipped_count: i32,
        #[sea_orm(column_type = "Text", nullable)]
        pub error_message: Option<String>,
        pub started_at: Option<DateTimeWithTimeZone>,
        pub completed_at: Option<DateTimeWithTimeZone>,
        pub created_at: DateTimeWithTimeZone,
        pub updated_at: DateTimeWithTimeZone,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl From<Model> for Campaign {
        fn from(model: Model) -> Self {
            Self {
                id: model.id,
                organization_id: model.organization_id,
                name: model.name,
                message_template: model.message_template,
                sender_id: model.sender_id,
                scheduled_at: model.scheduled_at.map(Into::into),
                status: model.status,
                sent_count: model.sent_count,
                delivered_count: model.delivered_count,
                failed_count: model.failed_count,
                skipped_count: model.skipped_count,
                error_message: model.error_message,
                started_at: model.started_at.map(Into::into),
                completed_at: model.completed_at.map(Into::into),
                created_at: model.created_at.into(),
                updated_at: model.updated_at.into(),
            }
        }
    }

    impl From<CreateCampaign> for ActiveModel {
        fn from(input: CreateCampaign) -> Self {
            ActiveModel {
                id: Set(Uuid::now_v7()),
                organization_id: Set(input.organization_id),
                name: Set(input.name),
                message_template: Set(input.message_template),
                sender_id: Set(input.sender_id),
                scheduled_at: Set(input.scheduled_at.map(Into::into)),
                status: Set(input.status),
                sent_count: Set(0),
                delivered_count: Set(0),
                failed_count: Set(0),
                skipped_count: Set(0),
                error_message: Set(None),
                started_at: Set(None),
                completed_at: Set(None),
                created_at: Set(chrono::Utc::now().into()),
                updated_at: Set(chrono::Utc::now().into()),
            }
        }
    }
}

pub mod recipient {
    use crate::models::{CreateRecipient, Recipient, RecipientStatus, SkipReason};
    use sea_orm::ActiveValue::Set;
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "broadcast_recipients")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub campaign_id: Uuid,
        pub destination: String,
        pub display_name: Option<String>,
        #[sea_orm(column_type = "JsonBinary", nullable)]
        pub variables: Option<Json>,
        pub status: RecipientStatus,
        pub skip_reason: Option<SkipReason>,
        #[sea_orm(column_type = "Text", nullable)]
        pub error_message: Option<String>,
        pub message_id: Option<Uuid>,
        pub attempt_count: i32,
        pub last_attempt_at: Option<DateTimeWithTimeZone>,
        pub created_at: DateTimeWithTimeZone,
        pub updated_at: DateTimeWithTimeZone,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl From<Model> for Recipient {
        fn from(model: Model) -> Self {
            Self {
                id: model.id,
                campaign_id: model.campaign_id,
                destination: model.destination,
                display_name: model.display_name,
                variables: model.variables,
                status: model.status,
                skip_reason: model.skip_reason,
                error_message: model.error_message,
                message_id: model.message_id,
                attempt_count: model.attempt_count,
                last_attempt_at: model.last_attempt_at.map(Into::into),
                created_at: model.created_at.into(),
                updated_at: model.updated_at.into(),
            }
        }
    }

    impl From<CreateRecipient> for ActiveModel {
        fn from(input: CreateRecipient) -> Self {
            ActiveModel {
                id: Set(Uuid::now_v7()),
                campaign_id: Set(input.campaign_id),
                destination: Set(input.destination),
                display_name: Set(input.display_name),
                variables: Set(input.variables),
                status: Set(RecipientStatus::Pending),
                skip_reason: Set(None),
                error_message: Set(None),
                message_id: Set(None),
                attempt_count: Set(0),
                last_attempt_at: Set(None),
                created_at: Set(chrono::Utc::now().into()),
                updated_at: Set(chrono::Utc::now().into()),
            }
        }
    }
}

pub mod conversation {
    use crate::models::Conversation;
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "conversations")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub organization_id: Uuid,
        pub contact_number: String,
        pub last_message_at: Option<DateTimeWithTimeZone>,
        pub created_at: DateTimeWithTimeZone,
        pub updated_at: DateTimeWithTimeZone,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl From<Model> for Conversation {
        fn from(model: Model) -> Self {
            Self {
                id: model.id,
                organization_id: model.organization_id,
                contact_number: model.contact_number,
                last_message_at: model.last_message_at.map(Into::into),
                created_at: model.created_at.into(),
                updated_at: model.updated_at.into(),
            }
        }
    }
}

pub mod message {
    use crate::models::{CreateMessage, MessageDirection, MessageRecord};
    use sea_orm::ActiveValue::Set;
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    /// Append-only ledger row; no updated_at.
    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "messages")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub conversation_id: Uuid,
        pub direction: MessageDirection,
        #[sea_orm(column_type = "Text")]
        pub body: String,
        pub provider_message_id: Option<String>,
        pub segments: i32,
        pub created_at: DateTimeWithTimeZone,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl From<Model> for MessageRecord {
        fn from(model: Model) -> Self {
            Self {
                id: model.id,
                conversation_id: model.conversation_id,
                direction: model.direction,
                body: model.body,
                provider_message_id: model.provider_message_id,
                segments: model.segments,
                created_at: model.created_at.into(),
            }
        }
    }

    impl From<CreateMessage> for ActiveModel {
        fn from(input: CreateMessage) -> Self {
            ActiveModel {
                id: Set(Uuid::now_v7()),
                conversation_id: Set(input.conversation_id),
                direction: Set(input.direction),
                body: Set(input.body),
                provider_message_id: Set(input.provider_message_id),
                segments: Set(input.segments),
                created_at: Set(chrono::Utc::now().into()),
            }
        }
    }
}

pub mod opt_out {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    /// Row presence is the opt-out flag.
    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "opt_outs")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub organization_id: Uuid,
        pub phone_number: String,
        pub created_at: DateTimeWithTimeZone,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod usage_event {
    use crate::models::CreateUsageEvent;
    use sea_orm::ActiveValue::Set;
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "usage_events")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub organization_id: Uuid,
        pub campaign_id: Uuid,
        pub recipient_id: Uuid,
        pub message_id: Option<Uuid>,
        pub unit_cost_cents: i64,
        pub created_at: DateTimeWithTimeZone,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl From<CreateUsageEvent> for ActiveModel {
        fn from(input: CreateUsageEvent) -> Self {
            ActiveModel {
                id: Set(Uuid::now_v7()),
                organization_id: Set(input.organization_id),
                campaign_id: Set(input.campaign_id),
                recipient_id: Set(input.recipient_id),
                message_id: Set(input.message_id),
                unit_cost_cents: Set(input.unit_cost_cents),
                created_at: Set(chrono::Utc::now().into()),
            }
        }
    }
}
