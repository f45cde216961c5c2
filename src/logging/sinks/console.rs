use std::io::{self, Stdout};

use tracing_subscriber::{layer::Layer, registry::LookupSpan};

use crate::logging::{config::LoggingConfig, formatter};

/// Console layer с конфигурацией.
pub fn layer_with_config<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let writer: fn() -> Stdout = io::stdout;
    formatter::build_formatter(
        config.console_format(),
        &config.console,
        config.console.with_ansi,
        writer,
    )
}
