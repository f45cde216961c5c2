use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{layer::Layer, registry::LookupSpan};

use crate::{
    error::LoggingError,
    logging::{config::LoggingConfig, formatter},
};

/// File layer с ежедневной ротацией и неблокирующей записью.
///
/// Возвращаемый `WorkerGuard` нужно держать до завершения работы: при его
/// уничтожении буфер сбрасывается на диск.
pub fn layer_with_config<S>(
    config: &LoggingConfig
) -> Result<(Box<dyn Layer<S> + Send + Sync>, WorkerGuard), LoggingError>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    config.ensure_log_dir()?;

    let appender = rolling::daily(&config.log_dir, &config.file.filename);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = formatter::build_formatter(config.file_format(), &config.console, false, writer);
    Ok((layer, guard))
}
