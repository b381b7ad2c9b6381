use std::io::{self, Stderr};

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::Layer as LayerTrait,
    registry::LookupSpan,
};

use super::config::{LogFormat, LoggingConfig};

/// Строит fmt-слой в формате из конфигурации.
///
/// Тип формата стирается через `Box<dyn Layer>`. Логи пишутся в stderr,
/// stdout остаётся за выводом приложения.
pub fn build_formatter_from_config<S>(
    config: &LoggingConfig,
) -> Box<dyn LayerTrait<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let writer: fn() -> Stderr = io::stderr;

    match config.format {
        LogFormat::Json => {
            let json_fmt = fmt::format()
                .json()
                .with_current_span(true)
                .with_target(config.with_target)
                .with_thread_ids(config.with_thread_ids)
                .with_line_number(config.with_line_numbers);
            Box::new(
                fmt::layer()
                    .event_format(json_fmt)
                    .fmt_fields(fmt::format::JsonFields::new())
                    .with_writer(writer)
                    .with_ansi(false),
            )
        }
        LogFormat::Pretty => {
            let pretty_fmt = fmt::format()
                .pretty()
                .with_target(config.with_target)
                .with_thread_ids(config.with_thread_ids)
                .with_line_number(config.with_line_numbers);
            Box::new(
                fmt::layer()
                    .event_format(pretty_fmt)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_writer(writer)
                    .with_ansi(config.with_ansi),
            )
        }
        LogFormat::Compact => {
            let compact_fmt = fmt::format()
                .compact()
                .with_target(config.with_target)
                .with_thread_ids(config.with_thread_ids)
                .with_line_number(config.with_line_numbers);
            Box::new(
                fmt::layer()
                    .event_format(compact_fmt)
                    .with_writer(writer)
                    .with_ansi(config.with_ansi),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use tracing::info;
    use tracing_subscriber::{prelude::*, registry::Registry};

    use super::*;

    /// Тест проверяет, что слой любого формата регистрируется и пишет
    /// без паники.
    #[test]
    fn test_every_format_builds() {
        for format in [LogFormat::Compact, LogFormat::Pretty, LogFormat::Json] {
            let cfg = LoggingConfig {
                format,
                with_ansi: false,
                ..Default::default()
            };
            let subscriber = Registry::default().with(build_formatter_from_config(&cfg));
            tracing::subscriber::with_default(subscriber, || {
                info!(?format, "formatter smoke test");
            });
        }
    }
}
