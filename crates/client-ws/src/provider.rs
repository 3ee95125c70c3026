//! External collaborator seams: credential provider and history fetcher.
//!
//! The transport never inspects the credential beyond treating it as an
//! opaque authenticator, and never retries a failed history fetch on its
//! own; failures are surfaced to the consumer.

use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use client_core::{ChatError, ChatErrorCategory, ChatMessage, ConversationId, InboundFrame};

/// Supplies the session credential on demand.
pub trait CredentialProvider: Send + Sync {
    /// Current credential, or `None` when the consumer is not logged in.
    fn credential(&self) -> Option<String>;
}

/// Fixed credential, mainly for tests and short-lived tools.
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credential: String,
}

impl StaticCredentialProvider {
    pub fn new(credential: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
        }
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn credential(&self) -> Option<String> {
        Some(self.credential.clone())
    }
}

/// Reads the credential from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvCredentialProvider {
    var: String,
}

impl EnvCredentialProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialProvider for EnvCredentialProvider {
    fn credential(&self) -> Option<String> {
        env::var(&self.var).ok().filter(|v| !v.trim().is_empty())
    }
}

/// Returns the finite, `created_at`-ascending historical batch for a
/// conversation.
#[async_trait]
pub trait HistoryFetcher: Send + Sync {
    async fn fetch_history(
        &self,
        conversation: &ConversationId,
    ) -> Result<Vec<ChatMessage>, ChatError>;
}

/// REST history fetcher: `GET {base}/rooms/{conversation}/messages` with a
/// bearer credential.
pub struct RestHistoryFetcher {
    http: reqwest::Client,
    base_url: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl RestHistoryFetcher {
    pub fn new(base_url: Url, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            credentials,
        }
    }

    fn history_url(&self, conversation: &ConversationId) -> Result<Url, ChatError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ChatError::new(
                    ChatErrorCategory::Usage,
                    "invalid_base_url",
                    format!("base url '{}' cannot carry path segments", self.base_url),
                )
            })?
            .pop_if_empty()
            .push("rooms")
            .push(conversation.as_str())
            .push("messages");
        Ok(url)
    }
}

#[async_trait]
impl HistoryFetcher for RestHistoryFetcher {
    async fn fetch_history(
        &self,
        conversation: &ConversationId,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let credential = self
            .credentials
            .credential()
            .ok_or_else(ChatError::missing_credential)?;
        let url = self.history_url(conversation)?;

        let response = self
            .http
            .get(url)
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|err| ChatError::history_unavailable(format!("history request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::history_unavailable(format!(
                "history fetch for '{conversation}' returned {status}"
            )));
        }

        let frames: Vec<InboundFrame> = response.json().await.map_err(|err| {
            ChatError::history_unavailable(format!("history payload invalid: {err}"))
        })?;

        Ok(frames.into_iter().map(ChatMessage::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_provider_always_yields() {
        let provider = StaticCredentialProvider::new("tok");
        assert_eq!(provider.credential().as_deref(), Some("tok"));
    }

    #[test]
    fn env_provider_ignores_blank_values() {
        // Process-global env; use a name unique to this test.
        let var = "DRIFTCHAT_TEST_CREDENTIAL_BLANK";
        unsafe { env::set_var(var, "   ") };
        assert_eq!(EnvCredentialProvider::new(var).credential(), None);

        unsafe { env::set_var(var, "secret") };
        assert_eq!(
            EnvCredentialProvider::new(var).credential().as_deref(),
            Some("secret")
        );
        unsafe { env::remove_var(var) };
    }

    #[test]
    fn builds_history_url_under_base_path() {
        let fetcher = RestHistoryFetcher::new(
            Url::parse("https://chat.example.org/api").expect("base url"),
            Arc::new(StaticCredentialProvider::new("tok")),
        );
        let url = fetcher
            .history_url(&ConversationId::from("room-9"))
            .expect("history url");
        assert_eq!(
            url.as_str(),
            "https://chat.example.org/api/rooms/room-9/messages"
        );
    }
}
