use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Delivery channel for verification codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpChannel {
    Email,
    Sms,
}

impl OtpChannel {
    pub const fn label(self) -> &'static str {
        match self {
            OtpChannel::Email => "email",
            OtpChannel::Sms => "sms",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Outbound email/SMS gateway.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(
        &self,
        channel: OtpChannel,
        destination: &str,
        message: &str,
    ) -> Result<(), NotifyError>;
}

/// Writes deliveries to the log instead of a gateway. Message bodies are not logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(
        &self,
        channel: OtpChannel,
        destination: &str,
        message: &str,
    ) -> Result<(), NotifyError> {
        info!(
            channel = channel.label(),
            destination = %mask(destination),
            length = message.len(),
            "notification dispatched"
        );
        Ok(())
    }
}

/// Keep the last four characters of a destination for log lines.
pub fn mask(destination: &str) -> String {
    let chars: Vec<char> = destination.chars().collect();
    let visible = chars.len().min(4);
    let hidden = chars.len() - visible;
    let tail: String = chars[hidden..].iter().collect();
    format!("{}{}", "*".repeat(hidden), tail)
}
