use error_stack::{report, ResultExt};
use google_sheets4::oauth2::{self, authenticator::Authenticator};
use thiserror::Error;
use tracing::instrument;

use crate::config::AuthConfig;

use super::http_client::{HttpClient, HttpsConnector};

/// Scopes requested for every token: Drive, Sheets and sending mail.
pub const SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/gmail.modify",
];

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Could not read credentials file '{0}'")]
    CredentialsFile(String),
    #[error("Could not build the authenticator")]
    Authenticator,
    #[error("Could not obtain an access token")]
    Token,
}

/// Anything able to hand out bearer tokens for Google APIs.
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self, scopes: &[&str]) -> error_stack::Result<String, AuthError>;
}

/// Authorized Google credentials. Cloning shares the token cache.
#[derive(Clone)]
pub struct GoogleCredentials {
    authenticator: Authenticator<HttpsConnector>,
}

impl std::fmt::Debug for GoogleCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GoogleCredentials {{ scopes: {:?} }}", SCOPES)
    }
}

impl GoogleCredentials {
    /// Builds the authenticator for `config` and fetches a first token so
    /// that missing or revoked credentials fail here rather than mid-run.
    #[instrument(name = "GoogleCredentials::connect", skip(client))]
    pub async fn connect(
        config: &AuthConfig,
        client: HttpClient,
    ) -> error_stack::Result<Self, AuthError> {
        let authenticator = match config {
            AuthConfig::Installed {
                client_secret,
                token_cache,
            } => {
                let secret = oauth2::read_application_secret(client_secret)
                    .await
                    .change_context_lazy(|| {
                        AuthError::CredentialsFile(client_secret.display().to_string())
                    })?;

                oauth2::InstalledFlowAuthenticator::with_client(
                    secret,
                    oauth2::InstalledFlowReturnMethod::HTTPRedirect,
                    client,
                )
                .persist_tokens_to_disk(token_cache)
                .build()
                .await
                .change_context(AuthError::Authenticator)?
            }
            AuthConfig::ServiceAccount { key } => {
                let secret = oauth2::read_service_account_key(key)
                    .await
                    .change_context_lazy(|| {
                        AuthError::CredentialsFile(key.display().to_string())
                    })
                    .attach_printable(
                        "Provide a valid service account private key to enable Google access",
                    )?;

                oauth2::ServiceAccountAuthenticator::with_client(secret, client)
                    .build()
                    .await
                    .change_context(AuthError::Authenticator)?
            }
        };

        let credentials = GoogleCredentials { authenticator };
        credentials.access_token(&SCOPES).await?;
        tracing::debug!("Google credentials ready");
        Ok(credentials)
    }

    /// A bearer token for `scopes`, refreshed by the authenticator when needed.
    pub async fn access_token(&self, scopes: &[&str]) -> error_stack::Result<String, AuthError> {
        let token = self
            .authenticator
            .token(scopes)
            .await
            .change_context(AuthError::Token)?;

        token
            .token()
            .map(str::to_owned)
            .ok_or_else(|| report!(AuthError::Token))
            .attach_printable("Token response carried no access token")
    }

    pub fn authenticator(&self) -> Authenticator<HttpsConnector> {
        self.authenticator.clone()
    }
}

#[async_trait::async_trait]
impl TokenSource for GoogleCredentials {
    async fn access_token(&self, scopes: &[&str]) -> error_stack::Result<String, AuthError> {
        GoogleCredentials::access_token(self, scopes).await
    }
}
