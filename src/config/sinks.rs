use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::{HttpRetryConfig, helpers::deserialize_duration_from_seconds};

/// Which sinks receive reports.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SinksConfig {
    /// Print JSON lines on standard output.
    #[serde(default)]
    pub console: bool,

    /// Post to a Matrix room.
    #[serde(default)]
    pub matrix: Option<MatrixConfig>,

    /// Send emails.
    #[serde(default)]
    pub email: Option<EmailConfig>,
}

impl SinksConfig {
    /// Returns `true` when no sink is enabled.
    pub fn is_empty(&self) -> bool {
        !self.console && self.matrix.is_none() && self.email.is_none()
    }
}

/// Settings of the Matrix sink.
#[derive(Debug, Clone, Deserialize)]
pub struct MatrixConfig {
    /// Homeserver base URL, e.g. `https://matrix.org`.
    pub server: Url,

    /// The room to post into, e.g. `!abcdef:matrix.org`.
    pub room_id: String,

    /// Access token of the posting user. The `MATRIX_TOKEN` environment
    /// variable takes precedence.
    #[serde(default)]
    pub access_token: String,

    /// Retry policy for the send requests.
    #[serde(default)]
    pub retry_policy: HttpRetryConfig,
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Implicit TLS, usually port 465.
    Tls,
    /// Plain connection upgraded with STARTTLS, usually port 587.
    #[default]
    Starttls,
    /// No encryption. Only for local relays.
    None,
}

fn default_smtp_timeout() -> Duration {
    Duration::from_secs(30)
}

/// SMTP relay settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// Relay host name.
    pub host: String,

    /// Relay port; the default for `security` when absent.
    #[serde(default)]
    pub port: Option<u16>,

    /// Login user.
    #[serde(default)]
    pub username: Option<String>,

    /// Login password.
    #[serde(default)]
    pub password: Option<String>,

    /// Connection security.
    #[serde(default)]
    pub security: SmtpSecurity,

    /// Timeout for SMTP commands, in seconds.
    #[serde(default = "default_smtp_timeout", deserialize_with = "deserialize_duration_from_seconds")]
    pub timeout: Duration,
}

/// Settings of the email sink.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Sender mailbox, e.g. `Sentinel <sentinel@example.org>`.
    pub from: String,

    /// Recipient mailboxes.
    pub to: Vec<String>,

    /// The relay to send through.
    pub smtp: SmtpConfig,
}
