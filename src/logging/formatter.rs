use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::Layer as LayerTrait,
    registry::LookupSpan,
};

use super::{LogFormat, LoggingConfig};

/// Fmt-слой под выбранный формат.
///
/// Возвращаем boxed trait-объект, чтобы стереть конкретный тип формата.
pub fn build_formatter<S, W>(
    config: &LoggingConfig,
    writer: W,
) -> Box<dyn LayerTrait<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(config.with_target);

    match config.format {
        // У JSON нет цветов
        LogFormat::Json => Box::new(
            layer
                .with_ansi(false)
                .event_format(fmt::format().json().with_current_span(true)),
        ),
        LogFormat::Pretty => Box::new(
            layer
                .with_ansi(config.with_ansi)
                .event_format(fmt::format().pretty()),
        ),
        LogFormat::Compact => Box::new(
            layer
                .with_ansi(config.with_ansi)
                .event_format(fmt::format().compact()),
        ),
    }
}
