//! Transport boundary for the host platform's session and message listings.
//!
//! The engine only ever performs two idempotent reads against the console:
//! sessions (with their messages) for a contact, and messages for one
//! session. Everything else about the host API stays outside this crate.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

/// One message as the host platform reports it.
///
/// Speaker classification happens downstream from the two raw flags:
/// automated messages are system-authored regardless of direction, and
/// `from_contact` separates the customer from the human agent.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    #[serde(default)]
    pub text: String,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub from_contact: bool,
    #[serde(default)]
    pub automated: bool,
}

/// One session record, with its messages embedded.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawSession {
    pub id: String,
    pub protocol_number: String,
    #[serde(default)]
    pub messages: Vec<RawMessage>,
}

/// Transport failures from the host platform.
#[derive(Debug, Error, Diagnostic)]
pub enum DirectoryError {
    #[error("host platform request failed: {0}")]
    #[diagnostic(
        code(threadloom::context::transport),
        help("Check the console base URL and network reachability.")
    )]
    Http(#[from] reqwest::Error),

    #[error("host platform returned status {status}")]
    #[diagnostic(code(threadloom::context::status))]
    Status { status: u16 },
}

/// The two idempotent remote reads the context providers need.
#[async_trait]
pub trait SessionDirectory: Send + Sync {
    /// Every session record belonging to the contact, messages included.
    async fn sessions_for_contact(
        &self,
        base_url: &str,
        contact_id: &str,
    ) -> Result<Vec<RawSession>, DirectoryError>;

    /// Messages of exactly one session.
    async fn messages_for_session(
        &self,
        base_url: &str,
        session_id: &str,
    ) -> Result<Vec<RawMessage>, DirectoryError>;
}

/// reqwest-backed [`SessionDirectory`] against the console's REST listings.
#[derive(Clone, Debug)]
pub struct HttpSessionDirectory {
    client: reqwest::Client,
}

impl HttpSessionDirectory {
    /// Default per-request timeout.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// Use a preconfigured client (proxies, custom TLS, test doubles).
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
    ) -> Result<T, DirectoryError> {
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl SessionDirectory for HttpSessionDirectory {
    #[instrument(skip(self, base_url), err)]
    async fn sessions_for_contact(
        &self,
        base_url: &str,
        contact_id: &str,
    ) -> Result<Vec<RawSession>, DirectoryError> {
        let url = format!(
            "{}/api/contacts/{contact_id}/sessions",
            base_url.trim_end_matches('/')
        );
        self.get_json(url).await
    }

    #[instrument(skip(self, base_url), err)]
    async fn messages_for_session(
        &self,
        base_url: &str,
        session_id: &str,
    ) -> Result<Vec<RawMessage>, DirectoryError> {
        let url = format!(
            "{}/api/sessions/{session_id}/messages",
            base_url.trim_end_matches('/')
        );
        self.get_json(url).await
    }
}
