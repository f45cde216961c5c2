use std::path::Path;

use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{error::SettingsError, logging::LoggingConfig};

/// Префикс переменных окружения: `MSGHUB__HUB__REGISTRY_CAPACITY=64`.
pub const ENV_PREFIX: &str = "MSGHUB";

/// Настройки хаба сообщений.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Начальная ёмкость реестра (число различных типов сообщений).
    pub registry_capacity: usize,
    /// Писать ли ошибки доставки на уровне `warn`. Если `false`, они уходят
    /// в `debug`.
    pub log_delivery_failures: bool,
}

/// Полная конфигурация процесса, встраивающего хаб.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub hub: HubConfig,
    pub logging: LoggingConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            registry_capacity: 16,
            log_delivery_failures: true,
        }
    }
}

impl HubConfig {
    /// Верхняя граница начальной ёмкости реестра.
    pub const MAX_REGISTRY_CAPACITY: usize = 1 << 20;

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.registry_capacity > Self::MAX_REGISTRY_CAPACITY {
            return Err(SettingsError::Invalid {
                field: "hub.registry_capacity",
                reason: format!(
                    "{} exceeds the maximum of {}",
                    self.registry_capacity,
                    Self::MAX_REGISTRY_CAPACITY
                ),
            });
        }
        Ok(())
    }
}

impl Settings {
    /// Загружает настройки: значения по умолчанию, затем переменные
    /// окружения с префиксом `MSGHUB`.
    pub fn load() -> Result<Self, SettingsError> {
        Self::build(defaults()?)
    }

    /// Загружает настройки из файла (TOML, YAML, JSON по расширению), поверх
    /// которого применяются переменные окружения.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::NotFound(path.to_path_buf()));
        }
        Self::build(defaults()?.add_source(File::from(path)))
    }

    fn build(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<Self, SettingsError> {
        let cfg = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.hub.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

fn defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, SettingsError> {
    let hub = HubConfig::default();
    let builder = Config::builder()
        .set_default("hub.registry_capacity", hub.registry_capacity as u64)?
        .set_default("hub.log_delivery_failures", hub.log_delivery_failures)?;
    Ok(builder)
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
