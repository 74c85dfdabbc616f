//! Mock SMS provider for testing

use super::{SendReceipt, SmsProvider};
use crate::error::{SmsError, SmsResult};
use crate::message::SmsMessage;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Mock SMS provider that captures sent messages
pub struct MockSmsProvider {
    sent_messages: Arc<Mutex<Vec<SmsMessage>>>,
    should_fail: bool,
    failure_message: Option<String>,
}

impl MockSmsProvider {
    /// Create a new mock provider
    pub fn new() -> Self {
        Self {
            sent_messages: Arc::new(Mutex::new(Vec::new())),
            should_fail: false,
            failure_message: None,
        }
    }

    /// Create a mock provider that always fails
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            sent_messages: Arc::new(Mutex::new(Vec::new())),
            should_fail: true,
            failure_message: Some(message.into()),
        }
    }

    /// Get all sent messages
    pub async fn sent_messages(&self) -> Vec<SmsMessage> {
        self.sent_messages.lock().await.clone()
    }

    /// Get the count of sent messages
    pub async fn sent_count(&self) -> usize {
        self.sent_messages.lock().await.len()
    }

    /// Clear all sent messages
    pub async fn clear(&self) {
        self.sent_messages.lock().await.clear();
    }

    /// Check if a message was sent to a specific number
    pub async fn was_sent_to(&self, destination: &str) -> bool {
        self.sent_messages
            .lock()
            .await
            .iter()
            .any(|m| m.to == destination)
    }
}

impl Default for MockSmsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SmsProvider for MockSmsProvider {
    async fn send(&self, message: &SmsMessage) -> SmsResult<SendReceipt> {
        if self.should_fail {
            let reason = self
                .failure_message
                .clone()
                .unwrap_or_else(|| "Mock failure".to_string());
            return Err(SmsError::Rejected(reason));
        }

        let segments = message.segments();
        self.sent_messages.lock().await.push(message.clone());

        Ok(SendReceipt {
            message_id: format!("mock-{}", uuid::Uuid::new_v4()),
            segments,
        })
    }

    async fn health_check(&self) -> SmsResult<()> {
        if self.should_fail {
            return Err(SmsError::NotConfigured(
                "Mock health check failed".to_string(),
            ));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
