//! SMS provider implementations

pub mod mock;
pub mod telnyx;
pub mod twilio;

pub use mock::MockSmsProvider;
pub use telnyx::TelnyxProvider;
pub use twilio::TwilioProvider;

use crate::error::{SmsError, SmsResult};
use crate::message::SmsMessage;
use async_trait::async_trait;
use std::sync::Arc;

/// Result of sending an SMS
#[derive(Debug, Clone)]
pub struct SendReceipt {
    /// Provider-specific message ID
    pub message_id: String,
    /// Number of billable segments the provider reported (or we computed)
    pub segments: u32,
}

/// Trait for SMS providers
#[async_trait]
pub trait SmsProvider: Send + Sync {
    /// Send a message
    async fn send(&self, message: &SmsMessage) -> SmsResult<SendReceipt>;

    /// Check if the provider is usable
    async fn health_check(&self) -> SmsResult<()>;

    /// Get provider name
    fn name(&self) -> &'static str;
}

/// Build a provider from the `SMS_PROVIDER` environment variable.
///
/// Recognized values are `mock` (default), `twilio`, and `telnyx`. Vendor
/// credentials are read from their own environment variables; a missing
/// credential fails here rather than on the first send.
pub fn from_env() -> SmsResult<Arc<dyn SmsProvider>> {
    let name = std::env::var("SMS_PROVIDER").unwrap_or_else(|_| "mock".to_string());

    match name.to_lowercase().as_str() {
        "mock" => Ok(Arc::new(MockSmsProvider::new())),
        "twilio" => Ok(Arc::new(TwilioProvider::from_env()?)),
        "telnyx" => Ok(Arc::new(TelnyxProvider::from_env()?)),
        other => Err(SmsError::NotConfigured(format!(
            "unknown SMS provider '{}'",
            other
        ))),
    }
}
