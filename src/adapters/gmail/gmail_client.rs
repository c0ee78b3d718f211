use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use error_stack::{report, ResultExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::instrument;

use crate::adapters::sheets::auth::{GoogleCredentials, TokenSource, SCOPES};
use crate::domain::error_chain::{ExceptionChain, LocalState};
use crate::ports::mailer::{EmailMessage, MailError, Mailer};

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

#[derive(Error, Debug)]
pub enum GmailError {
    #[error("Gmail request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Gmail API error ({status}): {body}")]
    Api { status: u16, body: String },
}

impl GmailError {
    fn cause(&self) -> &'static str {
        match self {
            GmailError::Request(_) => "RequestError",
            GmailError::Api { .. } => "HttpError",
        }
    }
}

#[derive(Deserialize)]
struct SentMessage {
    id: String,
}

/// Sends mail through the Gmail `users.messages.send` endpoint.
pub struct GmailMailer<T = GoogleCredentials> {
    client: Client,
    credentials: T,
    user_id: String,
}

impl<T: TokenSource> GmailMailer<T> {
    pub fn new(client: Client, credentials: T, user_id: impl Into<String>) -> Self {
        GmailMailer {
            client,
            credentials,
            user_id: user_id.into(),
        }
    }

    async fn post_raw(&self, access_token: &str, raw: &str) -> Result<String, GmailError> {
        let url = format!("{}/users/{}/messages/send", GMAIL_API_BASE, self.user_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&json!({ "raw": raw }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GmailError::Api { status, body });
        }

        let sent: SentMessage = response.json().await?;
        Ok(sent.id)
    }
}

#[async_trait::async_trait]
impl<T: TokenSource> Mailer for GmailMailer<T> {
    #[instrument(skip(self, message), fields(to = %message.to, subject = %message.subject))]
    async fn send(&self, message: &EmailMessage) -> error_stack::Result<String, MailError> {
        let access_token = self
            .credentials
            .access_token(&SCOPES)
            .await
            .change_context(MailError::Unauthorized)?;

        let raw = URL_SAFE.encode(build_mime(message));
        match self.post_raw(&access_token, &raw).await {
            Ok(id) => {
                tracing::info!("Message sent. Message ID: {}", id);
                Ok(id)
            }
            Err(error) => {
                let local_state = LocalState::new()
                    .with("cause", error.cause())
                    .with("user_id", &self.user_id)
                    .with("message", &json!({ "raw": raw }));
                Err(report!(ExceptionChain::wrap(error, "send_message", local_state))
                    .change_context(MailError::Delivery))
            }
        }
    }
}

/// Renders `message` as a single-part `text/plain` RFC 2822 message.
fn build_mime(message: &EmailMessage) -> String {
    let body = STANDARD.encode(message.body.as_bytes());
    let body = body
        .as_bytes()
        .chunks(76)
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>()
        .join("\r\n");

    format!(
        "Content-Type: text/plain; charset=\"utf-8\"\r\n\
         MIME-Version: 1.0\r\n\
         Content-Transfer-Encoding: base64\r\n\
         to: {}\r\n\
         from: {}\r\n\
         subject: {}\r\n\
         \r\n\
         {}\r\n",
        header_value(&message.to),
        header_value(&message.from),
        encode_subject(&header_value(&message.subject)),
        body
    )
}

fn header_value(value: &str) -> String {
    value.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

/// RFC 2047 encoded-word for non-ASCII subjects.
fn encode_subject(subject: &str) -> String {
    if subject.is_ascii() {
        subject.to_owned()
    } else {
        format!("=?utf-8?b?{}?=", STANDARD.encode(subject.as_bytes()))
    }
}
