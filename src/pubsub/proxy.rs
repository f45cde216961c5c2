use std::sync::Arc;

use msghub_error::HubResult;

use super::{HubMessage, HubSubscription};

/// Стратегия доставки сообщения подписке.
///
/// Прокси выбирается при подписке и вызывается хабом один раз на каждую
/// подписку, прошедшую фильтр. Реализация может доставить сообщение сразу,
/// отложить его или передать в другой поток. Сообщение и подписка приходят
/// как `Arc`, так что их можно забрать с собой.
pub trait DeliveryProxy: Send + Sync {
    fn deliver(
        &self,
        message: &Arc<dyn HubMessage>,
        subscription: &Arc<dyn HubSubscription>,
    ) -> HubResult<()>;
}

/// Синхронная доставка в потоке публикующего.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProxy;

impl DeliveryProxy for DefaultProxy {
    fn deliver(
        &self,
        message: &Arc<dyn HubMessage>,
        subscription: &Arc<dyn HubSubscription>,
    ) -> HubResult<()> {
        subscription.deliver(message.as_ref())
    }
}

/// Прокси по умолчанию, разделяемый всеми подписками без явного прокси.
pub fn default_proxy() -> Arc<dyn DeliveryProxy> {
    Arc::new(DefaultProxy)
}

impl<F> DeliveryProxy for F
where
    F: Fn(&Arc<dyn HubMessage>, &Arc<dyn HubSubscription>) -> HubResult<()> + Send + Sync,
{
    fn deliver(
        &self,
        message: &Arc<dyn HubMessage>,
        subscription: &Arc<dyn HubSubscription>,
    ) -> HubResult<()> {
        self(message, subscription)
    }
}
