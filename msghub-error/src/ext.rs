use std::{any::Any, error::Error};

use crate::StatusCode;

/// Общий контракт ошибок, которые могут лечь в корень `StackError`.
///
/// Object-safe: `StackError` хранит корень как `Arc<dyn ErrorExt>` и
/// восстанавливает конкретный тип через `as_any`.
pub trait ErrorExt: Error + Send + Sync + 'static {
    /// Код статуса. Без переопределения `Internal`.
    fn status_code(&self) -> StatusCode {
        StatusCode::Internal
    }

    fn as_any(&self) -> &dyn Any;
}
