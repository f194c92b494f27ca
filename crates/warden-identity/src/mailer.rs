//! Outbound mail collaborator.
//!
//! The managers hand raw recovery tokens to the mailer; only the digest is
//! ever stored. Delivery failures are logged by the caller and never roll
//! back the store mutation that triggered the send: the token exists even
//! if the email did not arrive.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Mutex;
use thiserror::Error;

/// Mail delivery errors.
#[derive(Debug, Error)]
pub enum MailerError {
    /// The provider rejected the send.
    #[error("Mail delivery failed: {0}")]
    Delivery(String),

    /// The HTTP request itself failed.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Sender of the three security-relevant emails.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send an email-verification link carrying the raw token.
    async fn send_verification_email(
        &self,
        to: &str,
        name: &str,
        token: &str,
    ) -> Result<(), MailerError>;

    /// Send a password-reset link carrying the raw token.
    async fn send_password_reset_email(
        &self,
        to: &str,
        name: &str,
        token: &str,
    ) -> Result<(), MailerError>;

    /// Notify the owner that their account was just locked.
    async fn send_account_locked_email(&self, to: &str, name: &str) -> Result<(), MailerError>;
}

/// Mailer backed by the Resend HTTP API.
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
    /// Base URL the verification and reset links point at.
    app_url: String,
}

impl ResendMailer {
    /// Resend send endpoint.
    const ENDPOINT: &'static str = "https://api.resend.com/emails";

    /// Create a mailer.
    #[must_use]
    pub fn new(api_key: impl Into<String>, from: impl Into<String>, app_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            from: from.into(),
            app_url: app_url.into(),
        }
    }

    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailerError> {
        let response = self
            .client
            .post(Self::ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "html": html,
            }))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(MailerError::Delivery(format!("{status}: {body}")))
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send_verification_email(
        &self,
        to: &str,
        name: &str,
        token: &str,
    ) -> Result<(), MailerError> {
        let verify_url = format!("{}/auth/verify-email?token={token}", self.app_url);
        let html = format!(
            "<h1>Welcome {name}!</h1>\
             <p>Please confirm your email address.</p>\
             <a href=\"{verify_url}\">Verify my email</a>\
             <p>This link expires in 24 hours.</p>"
        );
        self.send(to, "Verify your email address", &html).await
    }

    async fn send_password_reset_email(
        &self,
        to: &str,
        name: &str,
        token: &str,
    ) -> Result<(), MailerError> {
        let reset_url = format!("{}/reset-password?token={token}", self.app_url);
        let html = format!(
            "<h1>Password reset</h1>\
             <p>Hello {name},</p>\
             <p>You asked to reset your password.</p>\
             <a href=\"{reset_url}\">Reset my password</a>\
             <p>This link expires in 1 hour. If you did not request this, ignore this email.</p>"
        );
        self.send(to, "Reset your password", &html).await
    }

    async fn send_account_locked_email(&self, to: &str, name: &str) -> Result<(), MailerError> {
        let html = format!(
            "<h1>Account locked</h1>\
             <p>Hello {name},</p>\
             <p>Too many failed sign-in attempts were detected on your account.</p>\
             <p>It is locked for <strong>15 minutes</strong>. If these attempts were not \
             yours, change your password as soon as you can sign in again.</p>"
        );
        self.send(to, "Your account was temporarily locked", &html)
            .await
    }
}

/// Kinds of email recorded by [`MemoryMailer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentEmailKind {
    /// Email-verification link.
    Verification,
    /// Password-reset link.
    PasswordReset,
    /// Account-locked notification.
    AccountLocked,
}

/// One recorded send.
#[derive(Debug, Clone)]
pub struct SentEmail {
    /// Which of the three emails was sent.
    pub kind: SentEmailKind,
    /// Recipient address.
    pub to: String,
    /// Recipient display name.
    pub name: String,
    /// The raw token, for the two link-carrying kinds.
    pub token: Option<String>,
}

/// Mailer that records sends in memory, for tests and embedding.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<SentEmail>>,
}

impl MemoryMailer {
    /// Create an empty mailer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    /// The most recent raw token of a kind, if any was sent.
    #[must_use]
    pub fn last_token(&self, kind: SentEmailKind) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.kind == kind)
            .and_then(|m| m.token.clone())
    }

    fn record(&self, email: SentEmail) {
        self.sent.lock().unwrap().push(email);
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send_verification_email(
        &self,
        to: &str,
        name: &str,
        token: &str,
    ) -> Result<(), MailerError> {
        self.record(SentEmail {
            kind: SentEmailKind::Verification,
            to: to.to_string(),
            name: name.to_string(),
            token: Some(token.to_string()),
        });
        Ok(())
    }

    async fn send_password_reset_email(
        &self,
        to: &str,
        name: &str,
        token: &str,
    ) -> Result<(), MailerError> {
        self.record(SentEmail {
            kind: SentEmailKind::PasswordReset,
            to: to.to_string(),
            name: name.to_string(),
            token: Some(token.to_string()),
        });
        Ok(())
    }

    async fn send_account_locked_email(&self, to: &str, name: &str) -> Result<(), MailerError> {
        self.record(SentEmail {
            kind: SentEmailKind::AccountLocked,
            to: to.to_string(),
            name: name.to_string(),
            token: None,
        });
        Ok(())
    }
}
