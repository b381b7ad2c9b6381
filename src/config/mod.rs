//! Загрузка настроек приложения.

pub mod settings;

pub use settings::HubSettings;
