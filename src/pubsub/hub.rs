use std::{
    any::{type_name, Any, TypeId},
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use msghub_error::{require, HubError, HubResult, StackError};
use parking_lot::Mutex;
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{debug, trace, warn};

use super::{
    default_proxy,
    message::concrete_type_id,
    registry::{Registry, SubscriptionEntry},
    DeliveryAction, DeliveryProxy, HubMessage, HubSubscription, MessageFilter, Predicate,
    StrongSubscription, SubscriptionLifetime, SubscriptionToken, WeakSubscription,
};
use crate::{
    config::{HubConfig, Settings},
    error::SettingsError,
};

/// Внутреннее состояние хаба, разделяемое всеми клонами `Hub`.
pub(crate) struct HubCore {
    /// Единственный замок реестра. Под ним только читают и меняют реестр,
    /// код подписчиков под ним не вызывается никогда.
    registry: Mutex<Registry>,
    config: HubConfig,
    runtime: Option<Handle>,
    next_token: AtomicU64,
    stats: StatsCounters,
}

#[derive(Default)]
struct StatsCounters {
    publish_count: AtomicU64,
    delivered_count: AtomicU64,
    delivery_failures: AtomicU64,
    skipped_count: AtomicU64,
}

/// Снимок счётчиков хаба.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Число вызовов публикации (синхронной и асинхронной).
    pub publish_count: u64,
    /// Число успешных вызовов прокси.
    pub delivered_count: u64,
    /// Число ошибок и паник в фильтрах, прокси и действиях.
    pub delivery_failures: u64,
    /// Подписки, отсеянные фильтром или мёртвые на момент публикации.
    pub skipped_count: u64,
}

/// Итог одной публикации.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishCompletion {
    /// Имя конкретного типа опубликованного сообщения.
    pub message_type: &'static str,
    /// Подписки в снимке, т. е. все, для которых вызывался фильтр.
    pub attempted: usize,
    /// Подписки, доставка которым завершилась без ошибки.
    pub delivered: usize,
}

/// Параметры подписки.
///
/// Поля `action`, `filter` и `proxy` обязательны: `None` в любом из них
/// приводит к `HubError::InvalidArgument` без изменения реестра. Значения по
/// умолчанию: фильтр пропускает всё, подписка сильная, прокси синхронный.
///
/// Для слабой подписки хаб не удерживает `action` и фильтр: вызывающий
/// обязан хранить свой клон `Arc`, иначе подписка умрёт сразу.
pub struct SubscribeOptions<M> {
    pub action: Option<DeliveryAction<M>>,
    pub filter: Option<MessageFilter<M>>,
    pub lifetime: SubscriptionLifetime,
    pub proxy: Option<Arc<dyn DeliveryProxy>>,
}

impl<M> SubscribeOptions<M> {
    pub fn new<F>(action: F) -> Self
    where
        F: Fn(&M) + Send + Sync + 'static,
    {
        Self {
            action: Some(Arc::new(action)),
            ..Self::default()
        }
    }
}

impl<M> Default for SubscribeOptions<M> {
    fn default() -> Self {
        Self {
            action: None,
            filter: Some(MessageFilter::Always),
            lifetime: SubscriptionLifetime::Strong,
            proxy: Some(default_proxy()),
        }
    }
}

/// Построитель хаба.
#[derive(Debug, Default)]
pub struct HubBuilder {
    config: HubConfig,
    runtime: Option<Handle>,
}

impl HubBuilder {
    pub fn config(
        mut self,
        config: HubConfig,
    ) -> Self {
        self.config = config;
        self
    }

    /// Runtime для `publish_async`. Без него используется runtime, в
    /// контексте которого вызван `publish_async`.
    pub fn runtime(
        mut self,
        runtime: Handle,
    ) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Hub {
        Hub::from_core(Arc::new(HubCore {
            registry: Mutex::new(Registry::with_capacity(self.config.registry_capacity)),
            config: self.config,
            runtime: self.runtime,
            next_token: AtomicU64::new(1),
            stats: StatsCounters::default(),
        }))
    }
}

/// Внутрипроцессный хаб типизированных сообщений.
///
/// `Hub` дёшево клонируется: все клоны работают с одним реестром.
/// Подписки ищутся строго по конкретному типу сообщения.
#[derive(Clone)]
pub struct Hub {
    core: Arc<HubCore>,
}

impl HubCore {
    pub(crate) fn next_token_id(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }

    fn report_failure(
        &self,
        subscription: &dyn HubSubscription,
        error: &StackError,
    ) {
        self.stats.delivery_failures.fetch_add(1, Ordering::Relaxed);
        let token = subscription.token();
        if self.config.log_delivery_failures {
            warn!(
                message_type = subscription.message_type_name(),
                token_id = token.id(),
                lifetime = %subscription.lifetime(),
                status_code = %error.status_code(),
                error = %error,
                "Delivery to subscriber failed"
            );
        } else {
            debug!(
                message_type = subscription.message_type_name(),
                token_id = token.id(),
                lifetime = %subscription.lifetime(),
                status_code = %error.status_code(),
                error = %error,
                "Delivery to subscriber failed"
            );
        }
    }

    /// Превращает панику фильтра или действия в ошибку доставки.
    fn report_panic(
        &self,
        subscription: &dyn HubSubscription,
        stage: &str,
        panic: &(dyn Any + Send),
    ) {
        let error = StackError::from(HubError::DeliveryFailed {
            message_type: subscription.message_type_name().to_string(),
            reason: format!("{stage} panicked: {}", panic_message(panic)),
        });
        self.report_failure(subscription, &error);
    }
}

impl Hub {
    /// Хаб с настройками по умолчанию.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> HubBuilder {
        HubBuilder::default()
    }

    pub fn with_config(config: HubConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// Хаб из загруженных настроек.
    pub fn from_settings(settings: &Settings) -> Result<Self, SettingsError> {
        settings.hub.validate()?;
        Ok(Self::with_config(settings.hub.clone()))
    }

    pub(crate) fn from_core(core: Arc<HubCore>) -> Self {
        Self { core }
    }

    pub(crate) fn core(&self) -> &Arc<HubCore> {
        &self.core
    }

    pub fn config(&self) -> &HubConfig {
        &self.core.config
    }

    ////////////////////////////////////////////////////////////////////////////
    // Подписка
    ////////////////////////////////////////////////////////////////////////////

    /// Сильная подписка без фильтра.
    pub fn subscribe<M, F>(
        &self,
        action: F,
    ) -> SubscriptionToken
    where
        M: HubMessage,
        F: Fn(&M) + Send + Sync + 'static,
    {
        self.add_subscription::<M>(
            Arc::new(action),
            MessageFilter::Always,
            SubscriptionLifetime::Strong,
            default_proxy(),
        )
    }

    pub fn subscribe_with_proxy<M, F>(
        &self,
        action: F,
        proxy: Arc<dyn DeliveryProxy>,
    ) -> SubscriptionToken
    where
        M: HubMessage,
        F: Fn(&M) + Send + Sync + 'static,
    {
        self.add_subscription::<M>(
            Arc::new(action),
            MessageFilter::Always,
            SubscriptionLifetime::Strong,
            proxy,
        )
    }

    /// Слабая подписка: хаб не удерживает `action`.
    ///
    /// Подписка перестаёт получать сообщения, как только освобождён последний
    /// `Arc` на действие у вызывающего.
    pub fn subscribe_weak<M: HubMessage>(
        &self,
        action: &DeliveryAction<M>,
    ) -> SubscriptionToken {
        self.add_subscription::<M>(
            action.clone(),
            MessageFilter::Always,
            SubscriptionLifetime::Weak,
            default_proxy(),
        )
    }

    pub fn subscribe_weak_with_proxy<M: HubMessage>(
        &self,
        action: &DeliveryAction<M>,
        proxy: Arc<dyn DeliveryProxy>,
    ) -> SubscriptionToken {
        self.add_subscription::<M>(
            action.clone(),
            MessageFilter::Always,
            SubscriptionLifetime::Weak,
            proxy,
        )
    }

    /// Сильная подписка с фильтром.
    pub fn subscribe_filtered<M, F, P>(
        &self,
        action: F,
        filter: P,
    ) -> SubscriptionToken
    where
        M: HubMessage,
        F: Fn(&M) + Send + Sync + 'static,
        P: Fn(&M) -> bool + Send + Sync + 'static,
    {
        self.add_subscription::<M>(
            Arc::new(action),
            MessageFilter::new(filter),
            SubscriptionLifetime::Strong,
            default_proxy(),
        )
    }

    pub fn subscribe_filtered_with_proxy<M, F, P>(
        &self,
        action: F,
        filter: P,
        proxy: Arc<dyn DeliveryProxy>,
    ) -> SubscriptionToken
    where
        M: HubMessage,
        F: Fn(&M) + Send + Sync + 'static,
        P: Fn(&M) -> bool + Send + Sync + 'static,
    {
        self.add_subscription::<M>(
            Arc::new(action),
            MessageFilter::new(filter),
            SubscriptionLifetime::Strong,
            proxy,
        )
    }

    /// Слабая подписка с фильтром. Хаб не удерживает ни действие, ни фильтр.
    pub fn subscribe_weak_filtered<M: HubMessage>(
        &self,
        action: &DeliveryAction<M>,
        filter: &Predicate<M>,
    ) -> SubscriptionToken {
        self.add_subscription::<M>(
            action.clone(),
            MessageFilter::Predicate(filter.clone()),
            SubscriptionLifetime::Weak,
            default_proxy(),
        )
    }

    /// Общая форма подписки, к которой сводятся все остальные.
    pub fn subscribe_with<M: HubMessage>(
        &self,
        options: SubscribeOptions<M>,
    ) -> HubResult<SubscriptionToken> {
        let action = require!(options.action, "action");
        let filter = require!(options.filter, "filter");
        let proxy = require!(options.proxy, "proxy");
        Ok(self.add_subscription::<M>(action, filter, options.lifetime, proxy))
    }

    fn add_subscription<M: HubMessage>(
        &self,
        action: DeliveryAction<M>,
        filter: MessageFilter<M>,
        lifetime: SubscriptionLifetime,
        proxy: Arc<dyn DeliveryProxy>,
    ) -> SubscriptionToken {
        let token = SubscriptionToken::new::<M>(self);
        if lifetime == SubscriptionLifetime::Weak && !caller_keeps(&action, &filter) {
            warn!(
                message_type = type_name::<M>(),
                token_id = token.id(),
                "Weak subscription has no other owner and will never be delivered"
            );
        }
        let subscription: Arc<dyn HubSubscription> = match lifetime {
            SubscriptionLifetime::Strong => {
                Arc::new(StrongSubscription::new(token.clone(), action, filter))
            }
            SubscriptionLifetime::Weak => {
                Arc::new(WeakSubscription::new(token.clone(), &action, &filter))
            }
        };

        let total = {
            let mut registry = self.core.registry.lock();
            registry.insert(SubscriptionEntry::new(proxy, subscription));
            registry.len_for(TypeId::of::<M>())
        };

        debug!(
            message_type = type_name::<M>(),
            token_id = token.id(),
            lifetime = %lifetime,
            subscribers = total,
            "Subscribed"
        );
        token
    }

    ////////////////////////////////////////////////////////////////////////////
    // Отписка
    ////////////////////////////////////////////////////////////////////////////

    /// Удаляет подписку по токену.
    ///
    /// `None` вместо токена даёт ошибку `InvalidArgument`. Токен, уже
    /// отписанный, выпущенный для другого типа или другим хабом, ничего не
    /// меняет.
    pub fn unsubscribe<'a, M: HubMessage>(
        &self,
        token: impl Into<Option<&'a SubscriptionToken>>,
    ) -> HubResult<()> {
        let token = require!(token.into(), "token");
        self.remove_subscription::<M>(token);
        Ok(())
    }

    pub(crate) fn remove_subscription<M: HubMessage>(
        &self,
        token: &SubscriptionToken,
    ) -> usize {
        // Записи уничтожаются после снятия замка: их `Drop` может снова
        // обратиться к хабу.
        let removed = self.core.registry.lock().remove(TypeId::of::<M>(), token);
        if !removed.is_empty() {
            debug!(
                message_type = type_name::<M>(),
                token_id = token.id(),
                "Unsubscribed"
            );
        }
        removed.len()
    }

    /// Удаляет все подписки на `M`. Возвращает их число.
    pub fn clear<M: HubMessage>(&self) -> usize {
        let removed = self.core.registry.lock().clear(TypeId::of::<M>()).len();
        debug!(
            message_type = type_name::<M>(),
            removed, "Cleared subscriptions"
        );
        removed
    }

    /// Удаляет мёртвые слабые подписки всех типов.
    ///
    /// Хаб никогда не делает этого сам: мёртвые подписки только
    /// пропускаются при публикации.
    pub fn prune_dead(&self) -> usize {
        let removed = self.core.registry.lock().prune_dead().len();
        debug!(removed, "Pruned dead weak subscriptions");
        removed
    }

    ////////////////////////////////////////////////////////////////////////////
    // Публикация
    ////////////////////////////////////////////////////////////////////////////

    /// Синхронно доставляет сообщение всем подписчикам его типа.
    ///
    /// Ошибки и паники подписчиков, фильтров и прокси не доходят до
    /// публикующего: они логируются, учитываются в `stats()`, а доставка
    /// остальным подписчикам продолжается.
    pub fn publish<M: HubMessage>(
        &self,
        message: M,
    ) -> HubResult<()> {
        self.dispatch(Arc::new(message));
        Ok(())
    }

    /// Публикация уже разделяемого сообщения. `None` даёт ошибку
    /// `InvalidArgument`.
    pub fn publish_shared(
        &self,
        message: impl Into<Option<Arc<dyn HubMessage>>>,
    ) -> HubResult<()> {
        let message = require!(message.into(), "message");
        self.dispatch(message);
        Ok(())
    }

    /// Публикует сообщение в фоновой задаче tokio.
    ///
    /// Возвращает `SchedulingFailed`, если runtime недоступен.
    pub fn publish_async<M: HubMessage>(
        &self,
        message: M,
    ) -> HubResult<JoinHandle<PublishCompletion>> {
        self.schedule(Arc::new(message), None)
    }

    /// Как `publish_async`, но после завершения публикации вызывает
    /// `on_complete` с её итогом.
    pub fn publish_async_with<M, F>(
        &self,
        message: M,
        on_complete: F,
    ) -> HubResult<JoinHandle<PublishCompletion>>
    where
        M: HubMessage,
        F: FnOnce(&PublishCompletion) + Send + 'static,
    {
        self.schedule(Arc::new(message), Some(Box::new(on_complete)))
    }

    fn schedule(
        &self,
        message: Arc<dyn HubMessage>,
        on_complete: Option<Box<dyn FnOnce(&PublishCompletion) + Send>>,
    ) -> HubResult<JoinHandle<PublishCompletion>> {
        let runtime = match self.core.runtime.clone() {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|e| {
                StackError::from(HubError::SchedulingFailed {
                    reason: e.to_string(),
                })
                .context(format!("publishing {}", message.message_type_name()))
            })?,
        };

        let hub = self.clone();
        let handle = runtime.spawn_blocking(move || {
            let completion = hub.dispatch(message);
            if let Some(on_complete) = on_complete {
                if let Err(panic) = catch_unwind(AssertUnwindSafe(|| on_complete(&completion))) {
                    warn!(
                        message_type = completion.message_type,
                        error = panic_message(panic.as_ref()),
                        "Publish completion callback panicked"
                    );
                }
            }
            completion
        });
        Ok(handle)
    }

    fn dispatch(
        &self,
        message: Arc<dyn HubMessage>,
    ) -> PublishCompletion {
        let stats = &self.core.stats;
        stats.publish_count.fetch_add(1, Ordering::Relaxed);

        let message_type = message.message_type_name();
        let snapshot = self
            .core
            .registry
            .lock()
            .snapshot(concrete_type_id(message.as_ref()));

        let Some(entries) = snapshot else {
            trace!(message_type, "Published with no subscribers");
            return PublishCompletion {
                message_type,
                attempted: 0,
                delivered: 0,
            };
        };
        let attempted = entries.len();

        // Фильтры вычисляются до первой доставки.
        let mut targets = Vec::with_capacity(attempted);
        for entry in entries {
            let verdict = catch_unwind(AssertUnwindSafe(|| {
                entry.subscription.should_attempt_delivery(message.as_ref())
            }));
            match verdict {
                Ok(true) => targets.push(entry),
                Ok(false) => {
                    stats.skipped_count.fetch_add(1, Ordering::Relaxed);
                }
                Err(panic) => {
                    self.core
                        .report_panic(entry.subscription.as_ref(), "filter", panic.as_ref())
                }
            }
        }

        let mut delivered = 0;
        for entry in &targets {
            let outcome =
                catch_unwind(AssertUnwindSafe(|| entry.proxy.deliver(&message, &entry.subscription)));
            match outcome {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => self.core.report_failure(entry.subscription.as_ref(), &e),
                Err(panic) => {
                    self.core
                        .report_panic(entry.subscription.as_ref(), "subscriber", panic.as_ref())
                }
            }
        }
        stats
            .delivered_count
            .fetch_add(delivered as u64, Ordering::Relaxed);

        trace!(
            message_type,
            attempted,
            matched = targets.len(),
            delivered,
            "Published"
        );
        PublishCompletion {
            message_type,
            attempted,
            delivered,
        }
    }

    ////////////////////////////////////////////////////////////////////////////
    // Состояние
    ////////////////////////////////////////////////////////////////////////////

    /// Число подписок на `M`, включая мёртвые слабые.
    pub fn subscription_count<M: HubMessage>(&self) -> usize {
        self.core.registry.lock().len_for(TypeId::of::<M>())
    }

    pub fn has_subscribers<M: HubMessage>(&self) -> bool {
        self.subscription_count::<M>() > 0
    }

    pub fn total_subscriptions(&self) -> usize {
        self.core.registry.lock().len()
    }

    /// Число типов сообщений, на которые есть хотя бы одна подписка.
    pub fn message_type_count(&self) -> usize {
        self.core.registry.lock().type_count()
    }

    pub fn stats(&self) -> HubStats {
        let stats = &self.core.stats;
        HubStats {
            publish_count: stats.publish_count.load(Ordering::Relaxed),
            delivered_count: stats.delivered_count.load(Ordering::Relaxed),
            delivery_failures: stats.delivery_failures.load(Ordering::Relaxed),
            skipped_count: stats.skipped_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Hub {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let registry = self.core.registry.lock();
        f.debug_struct("Hub")
            .field("message_types", &registry.type_count())
            .field("subscriptions", &registry.len())
            .field("config", &self.core.config)
            .finish()
    }
}

/// Держит ли кто-то, кроме хаба, действие и фильтр слабой подписки.
fn caller_keeps<M>(
    action: &DeliveryAction<M>,
    filter: &MessageFilter<M>,
) -> bool {
    let filter_kept = match filter {
        MessageFilter::Always => true,
        MessageFilter::Predicate(predicate) => Arc::strong_count(predicate) > 1,
    };
    Arc::strong_count(action) > 1 && filter_kept
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
