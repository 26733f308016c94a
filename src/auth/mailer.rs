//! Outbound mail seam for the password reset flow.
//!
//! Actual SMTP delivery is out of scope; the production binary runs with
//! [`LogMailer`], and deployments wire a real transport behind the trait.

use std::sync::{Arc, Mutex};

use crate::auth::AuthResult;

pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> AuthResult<()>;
}

/// Writes the message to the application log instead of delivering it.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, to: &str, subject: &str, body: &str) -> AuthResult<()> {
        log::info!("mail to {}: {} | {}", to, subject, body);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Captures messages for assertions in tests.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<SentMail>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().expect("mailer lock").clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, to: &str, subject: &str, body: &str) -> AuthResult<()> {
        self.sent.lock().expect("mailer lock").push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
