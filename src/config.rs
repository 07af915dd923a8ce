//! Provider configuration handed over by the host at client construction.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://discord.com/api/v10";

/// Configuration for the REST client.
///
/// The core never reads environment variables; the host fills this in.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Bot token. Sensitive.
    pub token: String,

    /// Reserved for OAuth flows; unused by the REST core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Reserved for OAuth flows; unused by the REST core. Sensitive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Appended to the crate's own user-agent product token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent_suffix: Option<String>,

    /// Per-round-trip timeout applied by the underlying HTTP client.
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            client_id: None,
            secret: None,
            api_url: default_api_url(),
            user_agent_suffix: None,
            timeout: default_timeout(),
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// `DiscordBot (url, version)` as Discord asks bots to identify themselves.
    /// Never contains the token.
    pub fn user_agent(&self) -> String {
        let base = format!(
            "DiscordBot (https://github.com/discord-provider/discord-provider, {})",
            env!("CARGO_PKG_VERSION")
        );
        match self.user_agent_suffix.as_deref() {
            Some(suffix) if !suffix.is_empty() => format!("{base} {suffix}"),
            _ => base,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("token", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("user_agent_suffix", &self.user_agent_suffix)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.into()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
