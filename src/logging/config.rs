use std::{env, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::{HubError, HubResult};

/// Формат вывода fmt-слоя.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(HubError::Logging {
                reason: format!("unknown log format '{other}'"),
            }),
        }
    }
}

/// Конфигурация логирования.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Базовый уровень (`trace`..`error`).
    pub level: String,
    pub format: LogFormat,
    /// Дополнительные директивы `EnvFilter` (`topichub::transport=trace`).
    pub directives: Vec<String>,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_line_numbers: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            directives: Vec::new(),
            with_ansi: true,
            with_target: true,
            with_thread_ids: false,
            with_line_numbers: false,
        }
    }
}

impl LoggingConfig {
    /// Переопределения из окружения: `TOPICHUB_LOG_LEVEL`,
    /// `TOPICHUB_LOG_FORMAT`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("TOPICHUB_LOG_LEVEL") {
            self.level = level;
        }
        if let Some(format) = env::var("TOPICHUB_LOG_FORMAT")
            .ok()
            .and_then(|f| f.parse().ok())
        {
            self.format = format;
        }
    }

    pub fn validate(&self) -> HubResult<()> {
        Level::from_str(&self.level).map_err(|_| HubError::Logging {
            reason: format!("invalid log level '{}'", self.level),
        })?;
        Ok(())
    }

    /// Директива фильтра: базовый уровень, затем уточнения.
    pub fn build_filter_directive(&self) -> String {
        std::iter::once(self.level.as_str())
            .chain(self.directives.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(",")
    }
}
