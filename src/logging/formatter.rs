use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::Layer,
    registry::LookupSpan,
};

use crate::logging::config::{ConsoleConfig, LogFormat};

/// Слой `fmt` в выбранном формате поверх произвольного writer.
///
/// Возвращаем boxed trait-объект, чтобы стереть конкретный тип формата
/// (json/pretty/compact).
pub fn build_formatter<S, W>(
    format: LogFormat,
    options: &ConsoleConfig,
    with_ansi: bool,
    writer: W,
) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_writer(writer)
        .with_ansi(with_ansi)
        .with_target(options.with_target)
        .with_thread_names(options.with_thread_ids)
        .with_thread_ids(options.with_thread_ids)
        .with_line_number(options.with_line_numbers);

    match format {
        LogFormat::Json => Box::new(base.json().with_current_span(true)),
        LogFormat::Pretty => Box::new(base.pretty().with_span_events(FmtSpan::CLOSE)),
        LogFormat::Compact => Box::new(base.compact()),
    }
}
