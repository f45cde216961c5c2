use std::{
    any::{type_name, TypeId},
    fmt,
    marker::PhantomData,
    sync::{Arc, Weak},
};

use msghub_error::{HubError, HubResult};

use super::{message::concrete_type_id, HubMessage, SubscriptionToken};

/// Действие доставки сообщения подписчику.
pub type DeliveryAction<M> = Arc<dyn Fn(&M) + Send + Sync>;

/// Предикат фильтрации сообщений.
pub type Predicate<M> = Arc<dyn Fn(&M) -> bool + Send + Sync>;

/// Политика владения действием и фильтром подписки.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SubscriptionLifetime {
    /// Хаб владеет замыканиями наравне с подписчиком.
    #[default]
    Strong,
    /// Хаб хранит `Weak`: подписка умирает вместе с замыканиями подписчика.
    Weak,
}

impl fmt::Display for SubscriptionLifetime {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Strong => f.write_str("strong"),
            Self::Weak => f.write_str("weak"),
        }
    }
}

/// Фильтр сообщений подписки.
pub enum MessageFilter<M> {
    /// Пропускает все сообщения. Не хранит состояния, поэтому остаётся
    /// доступным и в слабых подписках.
    Always,
    Predicate(Predicate<M>),
}

impl<M> MessageFilter<M> {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&M) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(predicate))
    }

    pub fn matches(
        &self,
        message: &M,
    ) -> bool {
        match self {
            Self::Always => true,
            Self::Predicate(predicate) => predicate(message),
        }
    }
}

impl<M> Default for MessageFilter<M> {
    fn default() -> Self {
        Self::Always
    }
}

impl<M> Clone for MessageFilter<M> {
    fn clone(&self) -> Self {
        match self {
            Self::Always => Self::Always,
            Self::Predicate(predicate) => Self::Predicate(predicate.clone()),
        }
    }
}

impl<M> From<Predicate<M>> for MessageFilter<M> {
    fn from(predicate: Predicate<M>) -> Self {
        Self::Predicate(predicate)
    }
}

impl<M> fmt::Debug for MessageFilter<M> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Always => f.write_str("MessageFilter::Always"),
            Self::Predicate(_) => f.write_str("MessageFilter::Predicate(..)"),
        }
    }
}

/// Подписка, хранящаяся в реестре хаба.
///
/// Object-safe: реестр хранит подписки разных типов сообщений как
/// `Arc<dyn HubSubscription>`, а прокси получает её вместе с сообщением.
pub trait HubSubscription: Send + Sync {
    /// Токен, выданный вместе с подпиской.
    fn token(&self) -> &SubscriptionToken;

    /// `TypeId` объявленного типа сообщения.
    fn message_type(&self) -> TypeId;

    fn message_type_name(&self) -> &'static str;

    fn lifetime(&self) -> SubscriptionLifetime;

    /// `false`, если слабо удерживаемые действие или фильтр уже освобождены.
    fn is_alive(&self) -> bool;

    /// Стоит ли пытаться доставить сообщение: тип совпадает, подписка жива и
    /// фильтр пропускает сообщение.
    fn should_attempt_delivery(
        &self,
        message: &dyn HubMessage,
    ) -> bool;

    /// Вызывает действие доставки.
    ///
    /// Для мёртвой слабой подписки ничего не делает и возвращает `Ok(())`.
    fn deliver(
        &self,
        message: &dyn HubMessage,
    ) -> HubResult<()>;
}

/// Подписка, владеющая действием и фильтром.
pub struct StrongSubscription<M> {
    token: SubscriptionToken,
    action: DeliveryAction<M>,
    filter: MessageFilter<M>,
}

impl<M: HubMessage> StrongSubscription<M> {
    pub fn new(
        token: SubscriptionToken,
        action: DeliveryAction<M>,
        filter: MessageFilter<M>,
    ) -> Self {
        Self {
            token,
            action,
            filter,
        }
    }
}

impl<M: HubMessage> HubSubscription for StrongSubscription<M> {
    fn token(&self) -> &SubscriptionToken {
        &self.token
    }

    fn message_type(&self) -> TypeId {
        TypeId::of::<M>()
    }

    fn message_type_name(&self) -> &'static str {
        type_name::<M>()
    }

    fn lifetime(&self) -> SubscriptionLifetime {
        SubscriptionLifetime::Strong
    }

    fn is_alive(&self) -> bool {
        true
    }

    fn should_attempt_delivery(
        &self,
        message: &dyn HubMessage,
    ) -> bool {
        match downcast::<M>(message) {
            Some(message) => self.filter.matches(message),
            None => false,
        }
    }

    fn deliver(
        &self,
        message: &dyn HubMessage,
    ) -> HubResult<()> {
        let message = expect_type::<M>(message)?;
        (self.action)(message);
        Ok(())
    }
}

/// Слабо удерживаемый фильтр.
enum WeakFilter<M> {
    Always,
    Predicate(Weak<dyn Fn(&M) -> bool + Send + Sync>),
}

impl<M> WeakFilter<M> {
    fn downgrade(filter: &MessageFilter<M>) -> Self {
        match filter {
            MessageFilter::Always => Self::Always,
            MessageFilter::Predicate(predicate) => Self::Predicate(Arc::downgrade(predicate)),
        }
    }

    fn upgrade(&self) -> Option<MessageFilter<M>> {
        match self {
            Self::Always => Some(MessageFilter::Always),
            Self::Predicate(predicate) => predicate.upgrade().map(MessageFilter::Predicate),
        }
    }
}

/// Подписка, не удерживающая замыкания подписчика.
///
/// Как только подписчик отпускает последний `Arc` на действие или фильтр,
/// подписка перестаёт получать сообщения. Из реестра она при этом не
/// удаляется: это делают `unsubscribe`, `clear` или `prune_dead`.
pub struct WeakSubscription<M> {
    token: SubscriptionToken,
    action: Weak<dyn Fn(&M) + Send + Sync>,
    filter: WeakFilter<M>,
    _message: PhantomData<fn(&M)>,
}

impl<M: HubMessage> WeakSubscription<M> {
    pub fn new(
        token: SubscriptionToken,
        action: &DeliveryAction<M>,
        filter: &MessageFilter<M>,
    ) -> Self {
        Self {
            token,
            action: Arc::downgrade(action),
            filter: WeakFilter::downgrade(filter),
            _message: PhantomData,
        }
    }
}

impl<M: HubMessage> HubSubscription for WeakSubscription<M> {
    fn token(&self) -> &SubscriptionToken {
        &self.token
    }

    fn message_type(&self) -> TypeId {
        TypeId::of::<M>()
    }

    fn message_type_name(&self) -> &'static str {
        type_name::<M>()
    }

    fn lifetime(&self) -> SubscriptionLifetime {
        SubscriptionLifetime::Weak
    }

    fn is_alive(&self) -> bool {
        self.action.strong_count() > 0 && self.filter.upgrade().is_some()
    }

    fn should_attempt_delivery(
        &self,
        message: &dyn HubMessage,
    ) -> bool {
        let Some(message) = downcast::<M>(message) else {
            return false;
        };
        if self.action.strong_count() == 0 {
            return false;
        }
        match self.filter.upgrade() {
            Some(filter) => filter.matches(message),
            None => false,
        }
    }

    fn deliver(
        &self,
        message: &dyn HubMessage,
    ) -> HubResult<()> {
        let message = expect_type::<M>(message)?;
        if let Some(action) = self.action.upgrade() {
            action(message);
        }
        Ok(())
    }
}

fn downcast<M: HubMessage>(message: &dyn HubMessage) -> Option<&M> {
    if concrete_type_id(message) != TypeId::of::<M>() {
        return None;
    }
    message.as_any().downcast_ref::<M>()
}

fn expect_type<M: HubMessage>(message: &dyn HubMessage) -> HubResult<&M> {
    match downcast::<M>(message) {
        Some(message) => Ok(message),
        None => Err(HubError::MessageTypeMismatch {
            expected: type_name::<M>(),
            actual: message.message_type_name().to_string(),
        }
        .into()),
    }
}
