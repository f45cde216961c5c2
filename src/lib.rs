/// Configuration loading: hub settings and logging.
pub mod config;
/// Errors of configuration and logging setup.
pub mod error;
/// Logging on top of `tracing` (formats, filters, sinks).
pub mod logging;
/// The typed publish/subscribe hub.
pub mod pubsub;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Configuration.
pub use config::{HubConfig, Settings};
/// Setup errors.
pub use error::{LoggingError, SettingsError};
/// Logging bootstrap.
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingHandle};
/// Hub errors and result type.
pub use msghub_error::{HubError, HubResult, StackError, StatusCode};
/// Pub/Sub API.
pub use pubsub::{
    default_proxy, CancellableMessage, DefaultProxy, DeliveryAction, DeliveryProxy,
    GenericMessage, Hub, HubBuilder, HubMessage, HubStats, HubSubscription, MessageFilter,
    Predicate, PublishCompletion, SubscribeOptions, SubscriptionGuard, SubscriptionLifetime,
    SubscriptionToken,
};
