use std::{error::Error, fmt, panic::Location, sync::Arc};

use crate::{ErrorExt, StatusCode};

/// Ошибка операций хаба: корневая причина и цепочка контекста.
///
/// Контекст добавляется по пути наверх через [`StackError::context`]; каждое
/// звено помнит место вызова. Клонирование не копирует корень.
#[derive(Clone)]
pub struct StackError {
    root: Arc<dyn ErrorExt>,
    frames: Vec<Frame>,
}

/// Звено контекста.
#[derive(Debug, Clone)]
pub struct Frame {
    pub message: String,
    pub location: &'static Location<'static>,
}

impl StackError {
    pub fn new<E: ErrorExt>(err: E) -> Self {
        Self {
            root: Arc::new(err),
            frames: Vec::new(),
        }
    }

    /// Добавляет звено контекста с местом вызова.
    #[track_caller]
    pub fn context(
        mut self,
        message: impl Into<String>,
    ) -> Self {
        self.frames.push(Frame {
            message: message.into(),
            location: Location::caller(),
        });
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.root.status_code()
    }

    /// Совпадает ли код корневой ошибки с `code`.
    pub fn is(
        &self,
        code: StatusCode,
    ) -> bool {
        self.status_code() == code
    }

    pub fn root(&self) -> &dyn ErrorExt {
        self.root.as_ref()
    }

    /// Звенья контекста, от ближайшего к корню до внешнего.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn downcast_ref<T: ErrorExt>(&self) -> Option<&T> {
        self.root.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let frames: Vec<String> = self
            .frames
            .iter()
            .map(|frame| {
                format!(
                    "{} ({}:{})",
                    frame.message,
                    frame.location.file(),
                    frame.location.line()
                )
            })
            .collect();
        f.debug_struct("StackError")
            .field("root", &self.root.to_string())
            .field("status_code", &self.status_code())
            .field("frames", &frames)
            .finish()
    }
}

impl fmt::Display for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        for frame in self.frames.iter().rev() {
            write!(f, "{}: ", frame.message)?;
        }
        write!(f, "{}", self.root)
    }
}

impl Error for StackError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.root.as_ref())
    }
}

impl<E: ErrorExt> From<E> for StackError {
    fn from(err: E) -> Self {
        StackError::new(err)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HubError;

    /// Тест проверяет, что внешний контекст выводится первым, а звенья
    /// помнят место вызова.
    #[test]
    fn test_context_chain() {
        let err = StackError::new(HubError::SchedulingFailed {
            reason: "no runtime".to_string(),
        })
        .context("publishing Ping")
        .context("startup");

        assert_eq!(err.frames().len(), 2);
        assert_eq!(err.frames()[0].message, "publishing Ping");
        assert!(err.frames()[0].location.file().ends_with("stack.rs"));
        assert!(err
            .to_string()
            .starts_with("startup: publishing Ping: Unable to schedule"));
    }

    #[test]
    fn test_downcast_and_code() {
        let err = StackError::from(HubError::InvalidArgument { name: "token" });
        assert!(err.is(StatusCode::InvalidArgs));
        assert!(matches!(
            err.downcast_ref::<HubError>(),
            Some(HubError::InvalidArgument { name: "token" })
        ));
        assert!(err.source().is_some_and(|root| root.to_string().contains("token")));
    }
}
