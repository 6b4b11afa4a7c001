//! One-time codes for verifying an email address or phone number.

pub mod notifier;
pub mod router;
pub mod service;
pub mod store;

pub use notifier::{LogNotifier, Notifier, NotifyError, OtpChannel};
pub use router::verification_router;
pub use service::{OtpDispatch, VerificationError, VerificationService};
pub use store::{InMemoryOtpStore, OtpError, OtpRecord, OtpStore, MAX_ATTEMPTS};
