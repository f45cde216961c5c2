use tracing_subscriber::EnvFilter;

use crate::logging::config::LoggingConfig;

/// Собирает `EnvFilter`: `RUST_LOG` имеет приоритет, иначе используются
/// директивы из конфигурации.
///
/// Конфигурация к этому моменту уже прошла `validate`, поэтому неразборчивая
/// директива здесь означает ошибку вызывающего; в этом случае остаётся
/// уровень `info`.
pub fn build_filter_from_config(config: &LoggingConfig) -> EnvFilter {
    if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        return env_filter;
    }

    let directive = config.build_filter_directive();
    EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("Invalid log filter directive '{directive}': {e}; falling back to 'info'");
        EnvFilter::new("info")
    })
}
