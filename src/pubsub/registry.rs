use std::{any::TypeId, collections::HashMap, sync::Arc};

use super::{DeliveryProxy, HubSubscription, SubscriptionToken};

/// Подписка вместе с прокси, через который ей доставляются сообщения.
#[derive(Clone)]
pub(crate) struct SubscriptionEntry {
    pub proxy: Arc<dyn DeliveryProxy>,
    pub subscription: Arc<dyn HubSubscription>,
}

impl SubscriptionEntry {
    pub fn new(
        proxy: Arc<dyn DeliveryProxy>,
        subscription: Arc<dyn HubSubscription>,
    ) -> Self {
        Self {
            proxy,
            subscription,
        }
    }

    fn is_token(
        &self,
        token: &SubscriptionToken,
    ) -> bool {
        self.subscription.token() == token
    }
}

/// Реестр подписок, сгруппированных по точному типу сообщения.
///
/// Внутри типа подписки лежат в порядке регистрации. Пустые списки удаляются
/// сразу, поэтому наличие ключа означает хотя бы одну подписку.
/// Синхронизацию обеспечивает владелец реестра.
pub(crate) struct Registry {
    by_type: HashMap<TypeId, Vec<SubscriptionEntry>>,
}

impl Registry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            by_type: HashMap::with_capacity(capacity),
        }
    }

    pub fn insert(
        &mut self,
        entry: SubscriptionEntry,
    ) {
        let message_type = entry.subscription.message_type();
        self.by_type.entry(message_type).or_default().push(entry);
    }

    /// Извлекает подписки с указанным токеном.
    ///
    /// Удалённые записи возвращаются вызывающему: в них живёт состояние
    /// подписчика, и уничтожать его под замком реестра нельзя.
    pub fn remove(
        &mut self,
        message_type: TypeId,
        token: &SubscriptionToken,
    ) -> Vec<SubscriptionEntry> {
        let Some(entries) = self.by_type.get_mut(&message_type) else {
            return Vec::new();
        };
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(entries)
            .into_iter()
            .partition(|entry| entry.is_token(token));
        if kept.is_empty() {
            self.by_type.remove(&message_type);
        } else {
            *entries = kept;
        }
        removed
    }

    /// Копия списка подписок типа в порядке регистрации.
    pub fn snapshot(
        &self,
        message_type: TypeId,
    ) -> Option<Vec<SubscriptionEntry>> {
        self.by_type.get(&message_type).cloned()
    }

    pub fn clear(
        &mut self,
        message_type: TypeId,
    ) -> Vec<SubscriptionEntry> {
        self.by_type.remove(&message_type).unwrap_or_default()
    }

    /// Извлекает слабые подписки, чьи замыкания уже освобождены.
    pub fn prune_dead(&mut self) -> Vec<SubscriptionEntry> {
        let mut dead = Vec::new();
        self.by_type.retain(|_, entries| {
            let (alive, gone): (Vec<_>, Vec<_>) = std::mem::take(entries)
                .into_iter()
                .partition(|entry| entry.subscription.is_alive());
            dead.extend(gone);
            *entries = alive;
            !entries.is_empty()
        });
        dead
    }

    pub fn len_for(
        &self,
        message_type: TypeId,
    ) -> usize {
        self.by_type.get(&message_type).map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.by_type.values().map(Vec::len).sum()
    }

    pub fn type_count(&self) -> usize {
        self.by_type.len()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
