use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

pub const MAX_ATTEMPTS: u8 = 3;

/// Short-lived code issued for a subject such as `email:a@b.c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRecord {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub attempts: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OtpError {
    #[error("no code has been requested for this destination")]
    NotRequested,
    #[error("code has expired; request a new one")]
    Expired,
    #[error("code does not match; {remaining} attempt(s) left")]
    Mismatch { remaining: u8 },
    #[error("too many incorrect attempts; request a new code")]
    Locked,
    #[error("otp store unavailable: {0}")]
    Unavailable(String),
}

/// Keyed store of pending verification codes. A new issue replaces the previous code and
/// resets the attempt counter; a successful check consumes the code.
pub trait OtpStore: Send + Sync {
    fn issue_at(
        &self,
        subject: &str,
        code: String,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<OtpRecord, OtpError>;
    fn verify_at(&self, subject: &str, code: &str, now: DateTime<Utc>) -> Result<(), OtpError>;
}

#[derive(Default, Clone)]
pub struct InMemoryOtpStore {
    records: Arc<Mutex<HashMap<String, OtpRecord>>>,
}

impl InMemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, OtpRecord>>, OtpError> {
        self.records
            .lock()
            .map_err(|_| OtpError::Unavailable("otp mutex poisoned".to_string()))
    }

    /// Drop expired records; returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, OtpError> {
        let mut guard = self.lock()?;
        let before = guard.len();
        guard.retain(|_, record| record.expires_at > now);
        Ok(before - guard.len())
    }
}

impl OtpStore for InMemoryOtpStore {
    fn issue_at(
        &self,
        subject: &str,
        code: String,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<OtpRecord, OtpError> {
        let record = OtpRecord {
            code,
            expires_at: now + ttl,
            attempts: 0,
        };
        self.lock()?.insert(subject.to_string(), record.clone());
        Ok(record)
    }

    fn verify_at(&self, subject: &str, code: &str, now: DateTime<Utc>) -> Result<(), OtpError> {
        let mut guard = self.lock()?;
        let record = guard.get_mut(subject).ok_or(OtpError::NotRequested)?;

        if record.expires_at <= now {
            guard.remove(subject);
            return Err(OtpError::Expired);
        }
        if record.code == code {
            guard.remove(subject);
            return Ok(());
        }

        record.attempts += 1;
        if record.attempts >= MAX_ATTEMPTS {
            guard.remove(subject);
            return Err(OtpError::Locked);
        }
        Err(OtpError::Mismatch {
            remaining: MAX_ATTEMPTS - record.attempts,
        })
    }
}
