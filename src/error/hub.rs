use std::any::Any;

use thiserror::Error;
use topichub_error::{ErrorExt, StatusCode};

pub type HubResult<T> = Result<T, HubError>;

/// Ошибка уровня хаба.
///
/// `Clone` нужен [`BusFuture`](crate::BusFuture): повторный `wait()` отдаёт
/// тот же результат, поэтому внешние ошибки хранятся в виде строк.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    // ==== Сообщения ====
    #[error("message sink unavailable")]
    NoMessageSink,

    #[error("message encoding failed: {reason}")]
    Encode { reason: String },

    #[error("message decoding failed: {reason}")]
    Decode { reason: String },

    // ==== Использование API ====
    #[error("invalid usage: {reason}")]
    Usage { reason: String },

    // ==== Транспорт ====
    #[error("transport error: {reason}")]
    Transport { reason: String },

    #[error("transport connection closed")]
    Closed,

    // ==== Подключение и окружение ====
    #[error("invalid connection url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("no connector registered for protocol '{protocol}'")]
    UnknownProtocol { protocol: String },

    #[error("configuration error: {reason}")]
    Config { reason: String },

    #[error("logging setup failed: {reason}")]
    Logging { reason: String },
}

impl HubError {
    pub fn usage(reason: impl Into<String>) -> Self {
        Self::Usage {
            reason: reason.into(),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }
}

impl ErrorExt for HubError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NoMessageSink => StatusCode::NoMessageSink,
            Self::Encode { .. } => StatusCode::EncodingError,
            Self::Decode { .. } => StatusCode::DecodingError,
            Self::Usage { .. } => StatusCode::InvalidUsage,
            Self::Transport { .. } => StatusCode::Transport,
            Self::Closed => StatusCode::ConnectionClosed,
            Self::InvalidUrl { .. } => StatusCode::InvalidUrl,
            Self::UnknownProtocol { .. } => StatusCode::UnknownProtocol,
            Self::Config { .. } => StatusCode::ConfigError,
            Self::Logging { .. } => StatusCode::LoggingError,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "hub".to_string()),
            ("status_code", self.status_code().to_string()),
        ];

        match self {
            Self::UnknownProtocol { protocol } => tags.push(("protocol", protocol.clone())),
            Self::InvalidUrl { url, .. } => tags.push(("url", url.clone())),
            _ => {}
        }

        tags
    }
}

// === Преобразования ===

impl From<serde_json::Error> for HubError {
    fn from(err: serde_json::Error) -> Self {
        HubError::Decode {
            reason: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for HubError {
    fn from(err: config::ConfigError) -> Self {
        HubError::Config {
            reason: err.to_string(),
        }
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for HubError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        HubError::Closed
    }
}
