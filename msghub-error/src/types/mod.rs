pub mod hub;

pub use hub::{ErrorSource, HubError};
