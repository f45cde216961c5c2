pub mod ext;
mod macros;
pub mod stack;
pub mod status_code;
pub mod types;

pub use ext::ErrorExt;
pub use stack::{Frame, StackError};
pub use status_code::StatusCode;
pub use types::*;

/// Результат операций хаба.
pub type HubResult<T> = Result<T, StackError>;
