use thiserror::Error;
use uuid::Uuid;

use crate::models::CampaignStatus;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("Campaign not found: {0}")]
    CampaignNotFound(Uuid),

    #[error("Campaign {id} is {status}, not processable")]
    InvalidStatus { id: Uuid, status: CampaignStatus },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type BroadcastResult<T> = Result<T, BroadcastError>;

/// Implement From for sea_orm::DbErr
impl From<sea_orm::DbErr> for BroadcastError {
    fn from(err: sea_orm::DbErr) -> Self {
        BroadcastError::Database(err.to_string())
    }
}

impl From<sms::SmsError> for BroadcastError {
    fn from(err: sms::SmsError) -> Self {
        BroadcastError::Provider(err.to_string())
    }
}
