//! Внутрипроцессный хаб типизированных сообщений.
//!
//! - `hub`: `Hub`, подписка, отписка и публикация (в том числе асинхронная).
//! - `message`: контракт `HubMessage` и готовые типы сообщений.
//! - `subscription`: сильные и слабые подписки, фильтры.
//! - `token`: `SubscriptionToken` и RAII-обёртка `SubscriptionGuard`.
//! - `proxy`: стратегии доставки `DeliveryProxy`.
//! - `registry` (приватный): реестр подписок по типам сообщений.

pub mod hub;
pub mod message;
pub mod proxy;
mod registry;
pub mod subscription;
pub mod token;

pub use hub::{Hub, HubBuilder, HubStats, PublishCompletion, SubscribeOptions};
pub use message::{AsAny, CancellableMessage, GenericMessage, HubMessage, SenderRef};
pub use proxy::{default_proxy, DefaultProxy, DeliveryProxy};
pub use subscription::{
    DeliveryAction, HubSubscription, MessageFilter, Predicate, StrongSubscription,
    SubscriptionLifetime, WeakSubscription,
};
pub use token::{SubscriptionGuard, SubscriptionToken};
