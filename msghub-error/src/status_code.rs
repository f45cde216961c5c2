use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "serde_repr")]
use serde_repr::{Deserialize_repr, Serialize_repr};
#[cfg(feature = "strum_macros")]
use strum_macros::{AsRefStr, EnumIter};

/// Коды статуса ошибок хаба.
///
/// # Диапазоны:
/// - 1xxx: общие ошибки и ошибки вызывающего
/// - 2xxx: подписка
/// - 3xxx: доставка сообщений
/// - 4xxx: планирование асинхронной публикации
/// - 5xxx: конфигурация и окружение
#[cfg_attr(feature = "strum_macros", derive(AsRefStr, EnumIter))]
#[cfg_attr(feature = "serde_repr", derive(Serialize_repr, Deserialize_repr))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 1xxx ===
    Unexpected = 1002,
    Internal = 1003,
    InvalidArgs = 1004,

    // === 2xxx ===
    SubscriptionFailed = 2000,

    // === 3xxx ===
    DeliveryFailed = 3000,
    MessageTypeMismatch = 3001,

    // === 4xxx ===
    SchedulingFailed = 4000,

    // === 5xxx ===
    ConfigInvalid = 5000,
    ConfigLoadFailed = 5001,
    Io = 5002,
}

impl StatusCode {
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Имеет ли смысл повторить операцию.
    ///
    /// Только отказ планирования: runtime мог появиться позже. Остальные
    /// ошибки детерминированы.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SchedulingFailed)
    }
}

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        #[cfg(feature = "strum_macros")]
        {
            write!(f, "{} ({})", self.as_ref(), self.code())
        }
        #[cfg(not(feature = "strum_macros"))]
        {
            write!(f, "{:?} ({})", self, self.code())
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(StatusCode::SchedulingFailed.is_retryable());
        assert!(!StatusCode::InvalidArgs.is_retryable());
        assert!(!StatusCode::DeliveryFailed.is_retryable());
    }

    /// Тест проверяет числовые коды и обратное преобразование из `u32`.
    #[test]
    fn test_code_round_trip() {
        let n: u32 = StatusCode::DeliveryFailed.into();
        assert_eq!(n, 3000);
        assert_eq!(
            StatusCode::try_from(2000).unwrap(),
            StatusCode::SubscriptionFailed
        );
        assert!(StatusCode::try_from(99_999).is_err());
    }

    #[test]
    fn test_display_contains_name_and_code() {
        let s = StatusCode::SchedulingFailed.to_string();
        assert!(s.contains("SchedulingFailed"), "{s}");
        assert!(s.contains("4000"), "{s}");
    }
}
