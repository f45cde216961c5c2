//! Логирование на базе `tracing`.
//!
//! - `config`: `LoggingConfig` и переопределения из окружения.
//! - `filters`: построение `EnvFilter`.
//! - `formatter`: форматы pretty/compact/json.
//! - `sinks`: консоль и файл с ежедневной ротацией.
//! - `handle`: `LoggingHandle`, удерживающий фоновый writer.

pub mod config;
mod filters;
mod formatter;
pub mod handle;
pub mod sinks;

pub use config::{ConsoleConfig, FileConfig, LogFormat, LoggingConfig};
pub use handle::LoggingHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::LoggingError;

/// Инициализирует глобальный subscriber.
///
/// Порядок: переменные окружения `MSGHUB_LOG_*`, проверка конфигурации,
/// затем фильтр (`RUST_LOG` имеет приоритет), консоль и файл. Повторный
/// вызов возвращает `LoggingError::AlreadyInitialized`.
pub fn init_logging(mut config: LoggingConfig) -> Result<LoggingHandle, LoggingError> {
    config.apply_env_overrides();
    config.validate()?;

    let env_filter = filters::build_filter_from_config(&config);
    let mut layers = Vec::new();

    if config.console.enabled {
        layers.push(sinks::console::layer_with_config(&config));
    }

    let file_guard = if config.file.enabled {
        let (file_layer, guard) = sinks::file::layer_with_config(&config)?;
        layers.push(file_layer);
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        format = %config.format,
        console_enabled = config.console.enabled,
        file_enabled = config.file.enabled,
        log_dir = %config.log_dir.display(),
        "Logging system initialized"
    );

    Ok(LoggingHandle::new(file_guard))
}
