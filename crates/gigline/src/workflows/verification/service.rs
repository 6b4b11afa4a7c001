use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use super::notifier::{mask, Notifier, OtpChannel};
use super::store::{OtpError, OtpStore};
use crate::config::VerificationConfig;

const CODE_DIGITS: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OtpDispatch {
    pub channel: OtpChannel,
    pub destination: String,
    pub expires_in_secs: i64,
}

/// Issues and checks one-time codes for email and phone verification.
pub struct VerificationService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    ttl: chrono::Duration,
}

impl<S, N> VerificationService<S, N>
where
    S: OtpStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, config: &VerificationConfig) -> Self {
        let ttl = chrono::Duration::from_std(config.code_ttl)
            .unwrap_or_else(|_| chrono::Duration::minutes(10));
        Self {
            store,
            notifier,
            ttl,
        }
    }

    /// Store a fresh code and hand it to the notifier without waiting for delivery.
    pub fn send(
        &self,
        channel: OtpChannel,
        destination: &str,
    ) -> Result<OtpDispatch, VerificationError> {
        let destination = normalize_destination(channel, destination)?;
        let code = random_code();
        self.store
            .issue_at(&subject(channel, &destination), code.clone(), Utc::now(), self.ttl)?;

        let notifier = self.notifier.clone();
        let target = destination.clone();
        let message = format!("Your verification code is {code}");
        tokio::spawn(async move {
            if let Err(err) = notifier.deliver(channel, &target, &message).await {
                warn!(
                    channel = channel.label(),
                    destination = %mask(&target),
                    error = %err,
                    "otp delivery failed"
                );
            }
        });

        info!(channel = channel.label(), destination = %mask(&destination), "otp issued");
        Ok(OtpDispatch {
            channel,
            destination,
            expires_in_secs: self.ttl.num_seconds(),
        })
    }

    pub fn verify(
        &self,
        channel: OtpChannel,
        destination: &str,
        code: &str,
    ) -> Result<(), VerificationError> {
        let destination = normalize_destination(channel, destination)?;
        let code = code.trim();
        if code.is_empty() {
            return Err(VerificationError::Invalid("code is required".to_string()));
        }
        self.store
            .verify_at(&subject(channel, &destination), code, Utc::now())?;
        info!(channel = channel.label(), destination = %mask(&destination), "otp verified");
        Ok(())
    }
}

fn subject(channel: OtpChannel, destination: &str) -> String {
    format!("{}:{destination}", channel.label())
}

fn random_code() -> String {
    let upper = 10u32.pow(CODE_DIGITS);
    let value = rand::thread_rng().gen_range(0..upper);
    format!("{value:06}")
}

/// Lower-cases emails and strips phone formatting; rejects obviously malformed input.
pub fn normalize_destination(
    channel: OtpChannel,
    raw: &str,
) -> Result<String, VerificationError> {
    let raw = raw.trim();
    match channel {
        OtpChannel::Email => {
            let email = raw.to_ascii_lowercase();
            match email.split_once('@') {
                Some((local, domain))
                    if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') =>
                {
                    Ok(email)
                }
                _ => Err(VerificationError::Invalid(
                    "a valid email address is required".to_string(),
                )),
            }
        }
        OtpChannel::Sms => {
            let plus = raw.starts_with('+');
            let digits: String = raw
                .chars()
                .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
                .skip(usize::from(plus))
                .collect();
            if (7..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()) {
                Ok(if plus { format!("+{digits}") } else { digits })
            } else {
                Err(VerificationError::Invalid(
                    "a valid phone number is required".to_string(),
                ))
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Otp(#[from] OtpError),
}

impl VerificationError {
    pub fn status(&self) -> StatusCode {
        match self {
            VerificationError::Otp(OtpError::Unavailable(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            VerificationError::Invalid(_) => "VALIDATION_ERROR",
            VerificationError::Otp(OtpError::NotRequested) => "OTP_NOT_GENERATED",
            VerificationError::Otp(OtpError::Unavailable(_)) => "INTERNAL",
            VerificationError::Otp(_) => "INVALID_OTP",
        }
    }

    pub fn public_message(&self) -> String {
        match self {
            VerificationError::Otp(OtpError::Unavailable(_)) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}
