//! Twilio SMS provider
//!
//! Sends messages via the Twilio Programmable Messaging API.

use crate::error::{SmsError, SmsResult};
use crate::message::SmsMessage;
use crate::provider::{SendReceipt, SmsProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

/// Twilio API base URL
const TWILIO_API_URL: &str = "https://api.twilio.com/2010-04-01";

/// Twilio SMS provider
pub struct TwilioProvider {
    account_sid: String,
    auth_token: String,
    client: Client,
}

impl TwilioProvider {
    pub fn new(account_sid: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            client: Client::new(),
        }
    }

    /// Create from environment variables
    ///
    /// Expects:
    /// - `TWILIO_ACCOUNT_SID`
    /// - `TWILIO_AUTH_TOKEN`
    pub fn from_env() -> SmsResult<Self> {
        let account_sid = std::env::var("TWILIO_ACCOUNT_SID")
            .map_err(|_| SmsError::NotConfigured("TWILIO_ACCOUNT_SID not set".to_string()))?;

        let auth_token = std::env::var("TWILIO_AUTH_TOKEN")
            .map_err(|_| SmsError::NotConfigured("TWILIO_AUTH_TOKEN not set".to_string()))?;

        Ok(Self::new(account_sid, auth_token))
    }
}

/// Twilio message resource (the fields we read)
#[derive(Debug, Deserialize)]
struct TwilioResponse {
    sid: String,
    /// Twilio reports segment count as a string
    num_segments: Option<String>,
}

#[async_trait]
impl SmsProvider for TwilioProvider {
    async fn send(&self, message: &SmsMessage) -> SmsResult<SendReceipt> {
        let url = format!(
            "{}/Accounts/{}/Messages.json",
            TWILIO_API_URL, self.account_sid
        );

        let params = [
            ("To", message.to.as_str()),
            ("From", message.from.as_str()),
            ("Body", message.body.as_str()),
        ];

        debug!(to = %message.to, "Sending SMS via Twilio");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            let body: TwilioResponse = response
                .json()
                .await
                .map_err(|_| SmsError::MissingField("sid"))?;

            let segments = body
                .num_segments
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(|| message.segments());

            debug!(message_id = %body.sid, segments = segments, "SMS accepted by Twilio");

            Ok(SendReceipt {
                message_id: body.sid,
                segments,
            })
        } else {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, error = %error_body, "Twilio API error");

            match status.as_u16() {
                429 => Err(SmsError::RateLimited),
                400 => Err(SmsError::Rejected(error_body)),
                401 | 403 => Err(SmsError::AuthenticationFailed),
                _ => Err(SmsError::Network(format!(
                    "Twilio error ({}): {}",
                    status, error_body
                ))),
            }
        }
    }

    async fn health_check(&self) -> SmsResult<()> {
        if self.account_sid.is_empty() || self.auth_token.is_empty() {
            return Err(SmsError::NotConfigured(
                "Twilio credentials not configured".to_string(),
            ));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "twilio"
    }
}
