use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which step of a link conversion failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionErrorKind {
    /// The target API could not be reached or answered with a non-success status.
    Transport,
    /// The job carried no usable URL.
    InvalidInput,
    /// The delegated tab is not on the API origin.
    WrongOrigin,
    /// The delegated tab landed on a verification page.
    CaptchaRequired,
    /// The API returned a GraphQL error list.
    GraphQl,
    /// The API returned a fail code other than the configured success value.
    FailCode,
    /// No affiliate link could be found in the response body.
    MissingResult,
    /// No usable tab exists and opening one is disabled.
    NoTab,
    /// The page agent could not be reached inside the tab.
    Host,
}

impl ConversionErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionErrorKind::Transport => "transport",
            ConversionErrorKind::InvalidInput => "invalid_input",
            ConversionErrorKind::WrongOrigin => "wrong_origin",
            ConversionErrorKind::CaptchaRequired => "captcha_required",
            ConversionErrorKind::GraphQl => "graphql",
            ConversionErrorKind::FailCode => "fail_code",
            ConversionErrorKind::MissingResult => "missing_result",
            ConversionErrorKind::NoTab => "no_tab",
            ConversionErrorKind::Host => "host",
        }
    }

    /// Session problems an operator has to fix by hand (log in again, solve a captcha, open a tab).
    pub fn needs_operator(&self) -> bool {
        matches!(
            self,
            ConversionErrorKind::WrongOrigin
                | ConversionErrorKind::CaptchaRequired
                | ConversionErrorKind::NoTab
        )
    }
}

impl std::fmt::Display for ConversionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Queue error: {0}")]
    Queue(String),
    #[error("[{route}] {message}")]
    Conversion {
        route: String,
        kind: ConversionErrorKind,
        message: String,
    },
    #[error("Host error: {0}")]
    Host(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type RelayResult<T> = Result<T, RelayError>;

impl RelayError {
    pub fn conversion<R: Into<String>, M: Into<String>>(
        route: R,
        kind: ConversionErrorKind,
        message: M,
    ) -> Self {
        Self::Conversion {
            route: route.into(),
            kind,
            message: message.into(),
        }
    }
    pub fn queue<S: Into<String>>(msg: S) -> Self {
        Self::Queue(msg.into())
    }
    pub fn host<S: Into<String>>(msg: S) -> Self {
        Self::Host(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn conversion_kind(&self) -> Option<ConversionErrorKind> {
        match self {
            RelayError::Conversion { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        RelayError::Network(err.to_string())
    }
}

impl From<url::ParseError> for RelayError {
    fn from(err: url::ParseError) -> Self {
        RelayError::Configuration(format!("Invalid URL: {err}"))
    }
}

impl From<anyhow::Error> for RelayError {
    fn from(err: anyhow::Error) -> Self {
        RelayError::Internal(err.to_string())
    }
}
