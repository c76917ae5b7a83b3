//! Transactional email client for JobHive.
//!
//! Sends OTP verification and password-reset mail through the provider's
//! HTTP JSON API. A disabled mode logs instead of sending, for tests and
//! local development.

pub mod client;
pub mod error;

pub use client::{Mailer, MailerConfig};
pub use error::{MailError, MailResult};
