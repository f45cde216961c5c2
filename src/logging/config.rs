use std::{env, fmt, fs, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::Directive;

use crate::error::LoggingError;

/// Переменная окружения, перекрывающая уровень логирования.
pub const ENV_LOG_LEVEL: &str = "MSGHUB_LOG_LEVEL";
/// Переменная окружения, перекрывающая формат вывода.
pub const ENV_LOG_FORMAT: &str = "MSGHUB_LOG_FORMAT";

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Формат строк лога.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Настройки вывода в консоль.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    /// Формат консоли; если не задан, используется общий.
    pub format: Option<LogFormat>,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_line_numbers: bool,
}

/// Настройки вывода в файл с ежедневной ротацией.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub enabled: bool,
    /// Префикс имени файла; к нему добавляется дата.
    pub filename: String,
    /// Формат файла; если не задан, JSON.
    pub format: Option<LogFormat>,
}

/// Конфигурация логирования.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Базовый уровень: `trace`, `debug`, `info`, `warn`, `error` или `off`.
    pub level: String,
    pub format: LogFormat,
    pub console: ConsoleConfig,
    pub file: FileConfig,
    pub log_dir: PathBuf,
    /// Дополнительные директивы `EnvFilter`, например `msghub::pubsub=trace`.
    pub directives: Vec<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: None,
            with_ansi: true,
            with_target: true,
            with_thread_ids: false,
            with_line_numbers: false,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            filename: "msghub.log".to_string(),
            format: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            console: ConsoleConfig::default(),
            file: FileConfig::default(),
            log_dir: PathBuf::from("logs"),
            directives: Vec::new(),
        }
    }
}

impl LoggingConfig {
    /// Проверяет уровень и все дополнительные директивы.
    pub fn validate(&self) -> Result<(), LoggingError> {
        let level = self.level.to_ascii_lowercase();
        if !LEVELS.contains(&level.as_str()) {
            return Err(LoggingError::InvalidLevel(self.level.clone()));
        }
        for directive in &self.directives {
            Directive::from_str(directive).map_err(|e| LoggingError::InvalidDirective {
                directive: directive.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Применяет `MSGHUB_LOG_LEVEL` и `MSGHUB_LOG_FORMAT`, если они заданы.
    ///
    /// Некорректный формат игнорируется; некорректный уровень отловит
    /// `validate`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var(ENV_LOG_LEVEL) {
            if !level.trim().is_empty() {
                self.level = level.trim().to_string();
            }
        }
        if let Ok(format) = env::var(ENV_LOG_FORMAT) {
            if let Ok(format) = format.parse() {
                self.format = format;
            }
        }
    }

    /// Собирает строку директив для `EnvFilter`: базовый уровень и затем
    /// дополнительные директивы.
    pub fn build_filter_directive(&self) -> String {
        let mut parts = Vec::with_capacity(1 + self.directives.len());
        parts.push(self.level.to_ascii_lowercase());
        parts.extend(self.directives.iter().cloned());
        parts.join(",")
    }

    pub fn console_format(&self) -> LogFormat {
        self.console.format.unwrap_or(self.format)
    }

    pub fn file_format(&self) -> LogFormat {
        self.file.format.unwrap_or(LogFormat::Json)
    }

    /// Создаёт каталог логов, если включён вывод в файл.
    pub fn ensure_log_dir(&self) -> Result<(), LoggingError> {
        if !self.file.enabled {
            return Ok(());
        }
        fs::create_dir_all(&self.log_dir).map_err(|source| LoggingError::LogDir {
            path: self.log_dir.clone(),
            source,
        })
    }
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(LoggingError::InvalidDirective {
                directive: s.to_string(),
                reason: "expected one of: pretty, compact, json".to_string(),
            }),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Compact => f.write_str("compact"),
            Self::Json => f.write_str("json"),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
