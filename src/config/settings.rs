use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{logging::LoggingConfig, HubResult};

/// Префикс переменных окружения (`TOPICHUB_URL`, `TOPICHUB_LOGGING__LEVEL`).
pub const ENV_PREFIX: &str = "TOPICHUB";
/// URL подключения по умолчанию: встроенная шина в памяти.
pub const DEFAULT_URL: &str = "topichub+memory://local/topichub";

/// Настройки приложения.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSettings {
    /// URL подключения коннектора.
    pub url: String,
    /// Идентификатор клиента; перекрывает `client-id` из URL.
    pub client_id: Option<String>,
    pub dedup_handlers: bool,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl HubSettings {
    /// Значения по умолчанию, затем окружение.
    pub fn load() -> HubResult<Self> {
        Self::load_from(None)
    }

    /// Значения по умолчанию, затем необязательный файл, затем окружение.
    pub fn load_from(path: Option<&Path>) -> HubResult<Self> {
        let mut builder = Config::builder()
            // Добавляем значения по умолчанию
            .set_default("url", DEFAULT_URL)?
            .set_default("dedup_handlers", false)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        let cfg = builder
            // Переменные окружения с префиксом TOPICHUB_
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(cfg.try_deserialize()?)
    }
}
