use std::{
    any::{type_name, TypeId},
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, Weak},
};

use super::{hub::HubCore, Hub, HubMessage};

/// Непрозрачный дескриптор подписки.
///
/// Токены сравниваются по идентичности: клон токена равен оригиналу, а два
/// токена разных подписок не равны никогда, даже если их поля совпадают.
/// Токен не удерживает хаб.
#[derive(Clone)]
pub struct SubscriptionToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    id: u64,
    message_type: TypeId,
    message_type_name: &'static str,
    hub: Weak<HubCore>,
    /// Типизированная отписка, захваченная при выпуске токена.
    unsubscribe: fn(&Hub, &SubscriptionToken) -> usize,
}

fn unsubscribe_typed<M: HubMessage>(
    hub: &Hub,
    token: &SubscriptionToken,
) -> usize {
    hub.remove_subscription::<M>(token)
}

impl SubscriptionToken {
    /// Выпускает токен для подписки на `M` в указанном хабе.
    pub(crate) fn new<M: HubMessage>(hub: &Hub) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                id: hub.core().next_token_id(),
                message_type: TypeId::of::<M>(),
                message_type_name: type_name::<M>(),
                hub: Arc::downgrade(hub.core()),
                unsubscribe: unsubscribe_typed::<M>,
            }),
        }
    }

    /// Порядковый номер токена внутри хаба. Используется в логах.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn message_type(&self) -> TypeId {
        self.inner.message_type
    }

    pub fn message_type_name(&self) -> &'static str {
        self.inner.message_type_name
    }

    /// Выпущен ли токен этим хабом.
    pub fn belongs_to(
        &self,
        hub: &Hub,
    ) -> bool {
        std::ptr::eq(self.inner.hub.as_ptr(), Arc::as_ptr(hub.core()))
    }

    /// Отписывает подписку токена от хаба, который его выпустил.
    ///
    /// Возвращает `true`, если подписка была найдена и удалена. Повторный
    /// вызов, а также вызов после уничтожения хаба, ничего не делает.
    pub fn release(&self) -> bool {
        match self.inner.hub.upgrade() {
            Some(core) => (self.inner.unsubscribe)(&Hub::from_core(core), self) > 0,
            None => false,
        }
    }

    /// Превращает токен в guard, отписывающий подписку при `Drop`.
    pub fn into_guard(self) -> SubscriptionGuard {
        SubscriptionGuard { token: Some(self) }
    }
}

impl PartialEq for SubscriptionToken {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for SubscriptionToken {}

impl Hash for SubscriptionToken {
    fn hash<H: Hasher>(
        &self,
        state: &mut H,
    ) {
        std::ptr::hash(Arc::as_ptr(&self.inner), state)
    }
}

impl fmt::Debug for SubscriptionToken {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("SubscriptionToken")
            .field("id", &self.inner.id)
            .field("message_type", &self.inner.message_type_name)
            .finish()
    }
}

/// RAII-обёртка над токеном: отписывает подписку при уничтожении.
#[must_use = "dropping the guard unsubscribes immediately"]
pub struct SubscriptionGuard {
    token: Option<SubscriptionToken>,
}

impl SubscriptionGuard {
    pub fn token(&self) -> Option<&SubscriptionToken> {
        self.token.as_ref()
    }

    /// Отключает автоматическую отписку и возвращает токен.
    pub fn disarm(mut self) -> Option<SubscriptionToken> {
        self.token.take()
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.release();
        }
    }
}

impl fmt::Debug for SubscriptionGuard {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("token", &self.token)
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::pubsub::GenericMessage;

    type Tick = GenericMessage<u64>;

    /// Тест проверяет равенство по идентичности: клон равен оригиналу,
    /// разные подписки различаются.
    #[test]
    fn test_token_identity() {
        let hub = Hub::new();
        let a = hub.subscribe(|_: &Tick| {});
        let b = hub.subscribe(|_: &Tick| {});

        assert_eq!(a, a.clone());
        assert_ne!(a, b);

        let set: HashSet<_> = [a.clone(), a.clone(), b.clone()].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(a.id() < b.id());
        assert_eq!(a.message_type(), TypeId::of::<Tick>());
    }

    #[test]
    fn test_belongs_to() {
        let hub = Hub::new();
        let other = Hub::new();
        let token = hub.subscribe(|_: &Tick| {});

        assert!(token.belongs_to(&hub));
        assert!(token.belongs_to(&hub.clone()));
        assert!(!token.belongs_to(&other));
    }

    /// Тест проверяет, что `release` отписывает ровно один раз.
    #[test]
    fn test_release_is_idempotent() {
        let hub = Hub::new();
        let token = hub.subscribe(|_: &Tick| {});
        assert_eq!(hub.subscription_count::<Tick>(), 1);

        assert!(token.release());
        assert!(!token.release());
        assert_eq!(hub.subscription_count::<Tick>(), 0);
    }

    /// Тест проверяет, что токен переживает хаб и не мешает его уничтожению.
    #[test]
    fn test_release_after_hub_dropped() {
        let hub = Hub::new();
        let token = hub.subscribe(|_: &Tick| {});
        drop(hub);
        assert!(!token.release());
    }

    /// Тест проверяет отписку при уничтожении guard и отключение через
    /// `disarm`.
    #[test]
    fn test_guard() {
        let hub = Hub::new();
        {
            let _guard = hub.subscribe(|_: &Tick| {}).into_guard();
            assert_eq!(hub.subscription_count::<Tick>(), 1);
        }
        assert_eq!(hub.subscription_count::<Tick>(), 0);

        let guard = hub.subscribe(|_: &Tick| {}).into_guard();
        let token = guard.disarm().expect("token must be present");
        assert_eq!(hub.subscription_count::<Tick>(), 1);
        assert!(token.release());
    }
}
