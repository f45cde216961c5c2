use std::{any::Any, error::Error, sync::Arc};

use crate::{ErrorExt, StatusCode};

/// Причина ошибки, переживающая клонирование `HubError`.
pub type ErrorSource = Arc<dyn Error + Send + Sync + 'static>;

/// Ошибки хаба сообщений.
#[derive(Debug, Clone)]
pub enum HubError {
    /// Обязательный аргумент отсутствует. Возвращается до любой мутации
    /// реестра.
    InvalidArgument { name: &'static str },

    /// Не удалось установить подписку.
    ///
    /// Штатные пути подписки эту ошибку не возвращают; она предназначена
    /// для расширений, которые строят подписки поверх хаба.
    SubscriptionSetup {
        message_type: String,
        reason: String,
        source: Option<ErrorSource>,
    },

    /// Подписке передали сообщение чужого типа.
    MessageTypeMismatch {
        expected: &'static str,
        actual: String,
    },

    /// Доставка конкретному подписчику завершилась ошибкой или паникой.
    /// Публикующему никогда не возвращается.
    DeliveryFailed { message_type: String, reason: String },

    /// Не удалось запустить асинхронную публикацию.
    SchedulingFailed { reason: String },
}

impl HubError {
    /// Ошибка установки подписки с внутренней причиной.
    pub fn subscription_setup<E>(
        message_type: impl Into<String>,
        reason: impl Into<String>,
        source: E,
    ) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::SubscriptionSetup {
            message_type: message_type.into(),
            reason: reason.into(),
            source: Some(Arc::new(source)),
        }
    }
}

impl std::fmt::Display for HubError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::InvalidArgument { name } => {
                write!(f, "Invalid argument: '{name}' must be provided")
            }
            Self::SubscriptionSetup {
                message_type,
                reason,
                ..
            } => write!(f, "Unable to subscribe to {message_type}: {reason}"),
            Self::MessageTypeMismatch { expected, actual } => {
                write!(f, "Message type mismatch: expected {expected}, got {actual}")
            }
            Self::DeliveryFailed {
                message_type,
                reason,
            } => write!(f, "Delivery of {message_type} failed: {reason}"),
            Self::SchedulingFailed { reason } => {
                write!(f, "Unable to schedule asynchronous publish: {reason}")
            }
        }
    }
}

impl Error for HubError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SubscriptionSetup {
                source: Some(source),
                ..
            } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl ErrorExt for HubError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument { .. } => StatusCode::InvalidArgs,
            Self::SubscriptionSetup { .. } => StatusCode::SubscriptionFailed,
            Self::MessageTypeMismatch { .. } => StatusCode::MessageTypeMismatch,
            Self::DeliveryFailed { .. } => StatusCode::DeliveryFailed,
            Self::SchedulingFailed { .. } => StatusCode::SchedulingFailed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
