//! Outbound reply delivery.
//!
//! [`MailSender`] transmits through lettre's async SMTP transport when a relay
//! is configured and otherwise records a dry-run delivery. Either way the
//! email is marked responded and the sent text is kept on the record.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;

use crate::config::SmtpConfig;
use crate::store::{EmailStatus, EmailStore, SentResponse, StoreError};

/// Outcome of a successful delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    /// Always `true`; failures are reported as [`SendError`].
    pub success: bool,
    /// `Message-ID` assigned to the outgoing reply.
    pub message_id: String,
}

/// Errors from reply delivery.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The email to reply to does not exist.
    #[error("Email not found: {0}")]
    NotFound(String),
    /// Reading or updating the email record failed.
    #[error("email store error: {0}")]
    Store(#[from] StoreError),
    /// A sender or recipient address could not be parsed.
    #[error("invalid address {address:?}: {reason}")]
    Address {
        /// The offending address.
        address: String,
        /// Parser message.
        reason: String,
    },
    /// Building or transmitting the message failed.
    #[error("smtp delivery failed: {0}")]
    Transport(String),
}

/// Delivers a reply for one email.
#[async_trait]
pub trait ResponseSender: Send + Sync {
    /// Send `text` as the reply to `email_id`. `subject` defaults to `Re: <subject>`.
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] when the email is missing or delivery fails.
    async fn send(
        &self,
        email_id: &str,
        text: &str,
        subject: Option<&str>,
    ) -> Result<SendReceipt, SendError>;
}

/// SMTP sender that records each reply on the email.
pub struct MailSender {
    store: Arc<dyn EmailStore>,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

fn parse_mailbox(address: &str) -> Result<Mailbox, SendError> {
    address.parse().map_err(|e: lettre::address::AddressError| SendError::Address {
        address: address.to_owned(),
        reason: e.to_string(),
    })
}

impl MailSender {
    /// Sender with no relay: replies are recorded and logged, not transmitted.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Address`] if `from_address` is not a valid mailbox.
    pub fn dry_run(store: Arc<dyn EmailStore>, from_address: &str) -> Result<Self, SendError> {
        Ok(Self {
            store,
            transport: None,
            from: parse_mailbox(from_address)?,
        })
    }

    /// Sender using a STARTTLS relay.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay host or from address is invalid.
    pub fn smtp(store: Arc<dyn EmailStore>, config: &SmtpConfig) -> Result<Self, SendError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| SendError::Transport(e.to_string()))?
            .port(config.port);
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            let pass: String = pass.chars().filter(|c| !c.is_whitespace()).collect();
            builder = builder.credentials(Credentials::new(user.trim().to_owned(), pass));
        }
        Ok(Self {
            store,
            transport: Some(builder.build()),
            from: parse_mailbox(&config.from_address)?,
        })
    }

    /// Pick the SMTP sender when a relay is configured, dry-run otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay settings are invalid.
    pub fn from_config(
        store: Arc<dyn EmailStore>,
        config: Option<&SmtpConfig>,
    ) -> Result<Self, SendError> {
        match config.filter(|c| !c.host.trim().is_empty()) {
            Some(smtp) => Self::smtp(store, smtp),
            None => Self::dry_run(store, &SmtpConfig::default().from_address),
        }
    }

    /// Whether replies are actually transmitted.
    pub fn is_live(&self) -> bool {
        self.transport.is_some()
    }
}

#[async_trait]
impl ResponseSender for MailSender {
    async fn send(
        &self,
        email_id: &str,
        text: &str,
        subject: Option<&str>,
    ) -> Result<SendReceipt, SendError> {
        let mut email = self
            .store
            .find_by_id(email_id)
            .await?
            .ok_or_else(|| SendError::NotFound(email_id.to_owned()))?;

        let subject = subject.map_or_else(|| format!("Re: {}", email.subject), str::to_owned);
        let domain = self.from.email.domain().to_owned();
        let message_id = format!("<{}@{domain}>", uuid::Uuid::new_v4());

        match &self.transport {
            Some(transport) => {
                let message = Message::builder()
                    .from(self.from.clone())
                    .to(parse_mailbox(&email.sender_email)?)
                    .subject(subject.as_str())
                    .message_id(Some(message_id.clone()))
                    .body(text.to_owned())
                    .map_err(|e| SendError::Transport(e.to_string()))?;
                transport
                    .send(message)
                    .await
                    .map_err(|e| SendError::Transport(e.to_string()))?;
                tracing::info!(email_id, to = %email.sender_email, %subject, "reply sent");
            }
            None => {
                tracing::info!(
                    email_id,
                    to = %email.sender_email,
                    %subject,
                    "smtp not configured, reply recorded without transmission"
                );
            }
        }

        let sent_at = Utc::now();
        email.status = EmailStatus::Responded;
        email.response_time_ms = Some(
            sent_at
                .signed_duration_since(email.received_at)
                .num_milliseconds()
                .max(0),
        );
        email.sent_response = Some(SentResponse {
            message_id: message_id.clone(),
            sent_at,
            response_text: text.to_owned(),
        });
        self.store.save(&email).await?;

        Ok(SendReceipt {
            success: true,
            message_id,
        })
    }
}
