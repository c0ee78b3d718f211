use serde::Serialize;
use thiserror::Error;

/// Plain-text e-mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body: String,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailError {
    /// No usable credentials. The report holds the authentication error as is.
    #[error("Mail provider rejected the credentials")]
    Unauthorized,
    /// The provider call failed. The report holds the wrapped `ExceptionChain`.
    #[error("Message could not be delivered")]
    Delivery,
}

#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    /// Sends `message` and returns the id the provider assigned to it.
    async fn send(&self, message: &EmailMessage) -> error_stack::Result<String, MailError>;
}
