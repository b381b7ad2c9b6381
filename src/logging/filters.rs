use tracing_subscriber::EnvFilter;

use super::config::LoggingConfig;

/// Собирает фильтр: `RUST_LOG` имеет приоритет, иначе директива из
/// конфигурации, при некорректной директиве — `info`.
pub fn build_filter_from_config(config: &LoggingConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let directive = config.build_filter_directive();
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"))
}
