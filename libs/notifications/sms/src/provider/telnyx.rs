//! Telnyx SMS provider
//!
//! Sends messages via the Telnyx v2 messaging API.

use crate::error::{SmsError, SmsResult};
use crate::message::SmsMessage;
use crate::provider::{SendReceipt, SmsProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Telnyx API endpoint
const TELNYX_API_URL: &str = "https://api.telnyx.com/v2/messages";

/// Telnyx SMS provider
pub struct TelnyxProvider {
    api_key: String,
    client: Client,
}

impl TelnyxProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    /// Create from environment variables
    ///
    /// Expects `TELNYX_API_KEY`.
    pub fn from_env() -> SmsResult<Self> {
        let api_key = std::env::var("TELNYX_API_KEY")
            .map_err(|_| SmsError::NotConfigured("TELNYX_API_KEY not set".to_string()))?;

        Ok(Self::new(api_key))
    }
}

/// Telnyx send request payload
#[derive(Debug, Serialize)]
struct TelnyxRequest<'a> {
    to: &'a str,
    from: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TelnyxResponse {
    data: TelnyxMessage,
}

#[derive(Debug, Deserialize)]
struct TelnyxMessage {
    id: String,
    parts: Option<u32>,
}

#[async_trait]
impl SmsProvider for TelnyxProvider {
    async fn send(&self, message: &SmsMessage) -> SmsResult<SendReceipt> {
        let request = TelnyxRequest {
            to: &message.to,
            from: &message.from,
            text: &message.body,
        };

        debug!(to = %message.to, "Sending SMS via Telnyx");

        let response = self
            .client
            .post(TELNYX_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            let body: TelnyxResponse = response
                .json()
                .await
                .map_err(|_| SmsError::MissingField("data.id"))?;

            let segments = body.data.parts.unwrap_or_else(|| message.segments());

            debug!(message_id = %body.data.id, segments = segments, "SMS accepted by Telnyx");

            Ok(SendReceipt {
                message_id: body.data.id,
                segments,
            })
        } else {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, error = %error_body, "Telnyx API error");

            match status.as_u16() {
                429 => Err(SmsError::RateLimited),
                400 | 422 => Err(SmsError::Rejected(error_body)),
                401 | 403 => Err(SmsError::AuthenticationFailed),
                _ => Err(SmsError::Network(format!(
                    "Telnyx error ({}): {}",
                    status, error_body
                ))),
            }
        }
    }

    async fn health_check(&self) -> SmsResult<()> {
        if self.api_key.is_empty() {
            return Err(SmsError::NotConfigured(
                "Telnyx API key not configured".to_string(),
            ));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telnyx"
    }
}
