use std::{
    any::Any,
    fmt,
    sync::{Arc, Weak},
};

/// Разделяемый отправитель сообщения после `upgrade`.
pub type SenderRef = Arc<dyn Any + Send + Sync>;

/// Даёт доступ к значению как к `&dyn Any`.
///
/// Реализован для всех `'static`-типов, поэтому сообщения получают его
/// автоматически.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Контракт сообщения хаба.
///
/// Хаб маршрутизирует сообщение строго по его конкретному типу (`TypeId`);
/// общие трейты и «родительские» типы при поиске подписок не учитываются.
pub trait HubMessage: AsAny + Send + Sync {
    /// Отправитель сообщения, если он указан и ещё жив.
    ///
    /// Хаб хранит отправителя по слабой ссылке: `None` после освобождения
    /// отправителя является нормальной ситуацией, а не ошибкой.
    fn sender(&self) -> Option<SenderRef>;

    /// Имя конкретного типа сообщения для логов и ошибок.
    fn message_type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// `TypeId` конкретного типа сообщения за `dyn HubMessage`.
pub(crate) fn concrete_type_id(message: &dyn HubMessage) -> std::any::TypeId {
    message.as_any().type_id()
}

/// Сообщение с произвольным содержимым.
pub struct GenericMessage<T> {
    sender: Option<Weak<dyn Any + Send + Sync>>,
    content: T,
}

impl<T> GenericMessage<T> {
    /// Создаёт сообщение с отправителем.
    ///
    /// Отправитель не удерживается: сообщение хранит только `Weak`.
    pub fn new<S>(
        sender: &Arc<S>,
        content: T,
    ) -> Self
    where
        S: Any + Send + Sync,
    {
        let sender: Weak<S> = Arc::downgrade(sender);
        let sender: Weak<dyn Any + Send + Sync> = sender;
        Self {
            sender: Some(sender),
            content,
        }
    }

    /// Создаёт сообщение без отправителя.
    pub fn anonymous(content: T) -> Self {
        Self {
            sender: None,
            content,
        }
    }

    pub fn content(&self) -> &T {
        &self.content
    }

    pub fn into_content(self) -> T {
        self.content
    }

    /// Отправитель, приведённый к конкретному типу.
    ///
    /// `None`, если отправителя нет, он уже освобождён или имеет другой тип.
    pub fn sender_as<S>(&self) -> Option<Arc<S>>
    where
        S: Any + Send + Sync,
    {
        upgrade_sender(&self.sender)?.downcast::<S>().ok()
    }
}

impl<T> HubMessage for GenericMessage<T>
where
    T: Send + Sync + 'static,
{
    fn sender(&self) -> Option<SenderRef> {
        upgrade_sender(&self.sender)
    }
}

impl<T: fmt::Debug> fmt::Debug for GenericMessage<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("GenericMessage")
            .field("content", &self.content)
            .field("has_sender", &self.sender.is_some())
            .finish()
    }
}

/// Сообщение, позволяющее подписчику отменить породившую его операцию.
///
/// Хаб никак не обрабатывает отмену: это часть полезной нагрузки.
pub struct CancellableMessage<T> {
    sender: Option<Weak<dyn Any + Send + Sync>>,
    content: T,
    cancel: Arc<dyn Fn() + Send + Sync>,
}

impl<T> CancellableMessage<T> {
    pub fn new<S, C>(
        sender: &Arc<S>,
        content: T,
        cancel: C,
    ) -> Self
    where
        S: Any + Send + Sync,
        C: Fn() + Send + Sync + 'static,
    {
        let sender: Weak<S> = Arc::downgrade(sender);
        let sender: Weak<dyn Any + Send + Sync> = sender;
        Self {
            sender: Some(sender),
            content,
            cancel: Arc::new(cancel),
        }
    }

    pub fn anonymous<C>(
        content: T,
        cancel: C,
    ) -> Self
    where
        C: Fn() + Send + Sync + 'static,
    {
        Self {
            sender: None,
            content,
            cancel: Arc::new(cancel),
        }
    }

    pub fn content(&self) -> &T {
        &self.content
    }

    /// Сигнализирует отмену операции, породившей сообщение.
    pub fn cancel(&self) {
        (self.cancel)()
    }
}

impl<T> HubMessage for CancellableMessage<T>
where
    T: Send + Sync + 'static,
{
    fn sender(&self) -> Option<SenderRef> {
        upgrade_sender(&self.sender)
    }
}

impl<T: fmt::Debug> fmt::Debug for CancellableMessage<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("CancellableMessage")
            .field("content", &self.content)
            .field("has_sender", &self.sender.is_some())
            .finish_non_exhaustive()
    }
}

fn upgrade_sender(sender: &Option<Weak<dyn Any + Send + Sync>>) -> Option<SenderRef> {
    sender.as_ref().and_then(Weak::upgrade)
}
