/// Достаёт значение обязательного аргумента из `Option`.
///
/// `None` превращается в `HubError::InvalidArgument` с именем аргумента и
/// немедленно возвращается из текущей функции как `StackError`.
///
/// ```ignore
/// use msghub_error::{require, HubResult};
///
/// fn deliver_to(proxy: Option<u8>) -> HubResult<u8> {
///     let proxy = require!(proxy, "proxy");
///     Ok(proxy)
/// }
/// ```
#[macro_export]
macro_rules! require {
    ($value:expr, $name:expr) => {
        match $value {
            Some(value) => value,
            None => {
                return Err($crate::StackError::from(
                    $crate::HubError::InvalidArgument { name: $name },
                ))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{HubError, HubResult, StatusCode};

    fn double(value: Option<u32>) -> HubResult<u32> {
        let value = require!(value, "value");
        Ok(value * 2)
    }

    /// Тест проверяет, что `require!` возвращает значение или
    /// `InvalidArgument` с именем аргумента.
    #[test]
    fn test_require() {
        assert_eq!(double(Some(21)).unwrap(), 42);

        let err = double(None).unwrap_err();
        assert!(err.is(StatusCode::InvalidArgs));
        assert!(matches!(
            err.downcast_ref::<HubError>(),
            Some(HubError::InvalidArgument { name: "value" })
        ));
    }
}
