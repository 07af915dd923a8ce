//! Error types for the REST core.
//!
//! Every fallible operation in the crate returns [`Result`]. Non-2xx replies
//! from Discord surface as [`Error::Api`], which resources inspect only through
//! [`Error::is_status`] / [`is_status`].

use std::fmt;

use thiserror::Error;

/// A non-2xx (non-429) reply from the Discord API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub method: String,
    pub path: String,
    pub status: u16,
    /// Discord's JSON error code (distinct from the HTTP status); 0 if absent.
    pub code: i64,
    pub message: String,
    /// Raw response body, used when `message` is empty.
    pub raw: String,
}

impl ApiError {
    pub fn new(method: impl Into<String>, path: impl Into<String>, status: u16) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            status,
            code: 0,
            message: String::new(),
            raw: String::new(),
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = raw.into();
        self
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "discord api error: {} {} returned status {}",
            self.method, self.path, self.status
        )?;
        if self.code != 0 {
            write!(f, " (code {})", self.code)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)
        } else if !self.raw.is_empty() {
            write!(f, ": {}", self.raw)
        } else {
            Ok(())
        }
    }
}

impl std::error::Error for ApiError {}

#[derive(Error, Debug)]
pub enum Error {
    /// Discord answered with a non-success status.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Network, TLS or connection failure.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The host cancelled the operation while it was waiting.
    #[error("operation cancelled")]
    Cancelled,

    /// A 2xx body (or a request body) was not valid JSON for the target type.
    #[error("JSON error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid id {0:?}: expected two non-empty parts separated by ':'")]
    InvalidId(String),

    #[error("invalid permission value {0:?}")]
    InvalidPermission(String),

    #[error("invalid channel type {0:?}")]
    InvalidChannelType(String),

    #[error("invalid overwrite type {0:?}: expected \"role\" or \"user\"")]
    InvalidOverwriteType(String),

    #[error("invalid HTTP method {0:?}")]
    InvalidMethod(String),

    #[error("cannot read {0}: {1}")]
    File(String, #[source] std::io::Error),

    #[error("multipart body needs at least one field or file part")]
    EmptyMultipart,

    #[error("missing required field {0:?}")]
    MissingField(String),

    /// No role currently sits at the requested position.
    #[error("role position {position} is out of bounds for guild {guild_id}")]
    PositionOutOfBounds { guild_id: String, position: i64 },

    /// A declared id does not exist on the remote side.
    #[error("{kind} {id} declared but not found in guild {guild_id}")]
    MissingRemote {
        kind: &'static str,
        id: String,
        guild_id: String,
    },
}

impl Error {
    /// True only for a typed API error carrying exactly `status`.
    pub fn is_status(&self, status: u16) -> bool {
        matches!(self, Error::Api(api) if api.status == status)
    }

    /// Shorthand for `is_status(404)`, the "remote gone" signal.
    pub fn is_not_found(&self) -> bool {
        self.is_status(404)
    }

    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(api) => Some(api),
            _ => None,
        }
    }
}

/// Status predicate over an optional error; `None` never matches.
pub fn is_status(err: Option<&Error>, status: u16) -> bool {
    err.is_some_and(|e| e.is_status(status))
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(Error: Send, Sync);

    #[test]
    fn display_includes_method_path_status() {
        let err = ApiError::new("GET", "/channels/1", 404);
        let text = err.to_string();
        assert!(text.contains("GET"));
        assert!(text.contains("/channels/1"));
        assert!(text.contains("404"));
        assert!(!text.contains("code"));
    }

    #[test]
    fn display_prefers_message_over_raw() {
        let err = ApiError::new("GET", "/channels/1", 404)
            .with_code(10003)
            .with_message("Unknown Channel")
            .with_raw("{\"message\":\"Unknown Channel\"}");
        let text = err.to_string();
        assert!(text.contains("code 10003"));
        assert!(text.ends_with(": Unknown Channel"));
    }

    #[test]
    fn display_falls_back_to_raw() {
        let err = ApiError::new("PATCH", "/guilds/1", 502).with_raw("bad gateway");
        assert!(err.to_string().ends_with(": bad gateway"));
    }

    #[test]
    fn status_predicate() {
        let err = Error::from(ApiError::new("GET", "/x", 404));
        assert!(err.is_status(404));
        assert!(err.is_not_found());
        assert!(!err.is_status(403));
        assert!(is_status(Some(&err), 404));
        assert!(!is_status(None, 404));
    }

    #[test]
    fn status_predicate_ignores_other_kinds() {
        assert!(!Error::Cancelled.is_status(404));
        assert!(!Error::InvalidId("x".into()).is_status(400));
    }
}
