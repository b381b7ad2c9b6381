use std::{fmt, marker::PhantomData, sync::Arc};

use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use crate::{BusFuture, HubError, Message};

/// Потребитель сообщений.
///
/// Реализуется реакторами, подписчиками watch и ссылками на удалённые
/// endpoint-ы. Результат обработки сообщается через [`BusFuture`].
pub trait MessageSink: Send + Sync {
    fn consume_message(
        &self,
        msg: Message,
    ) -> BusFuture;
}

/// Разделяемая ссылка на потребителя.
pub type SinkRef = Arc<dyn MessageSink>;

/// Источник сообщений: принимает текущего потребителя.
///
/// `None` отвязывает источник. Повторная привязка перезаписывает
/// предыдущего потребителя.
pub trait MessageSource: Send + Sync {
    fn sink_message(
        &self,
        sink: Option<SinkRef>,
    );
}

impl<T: MessageSink + ?Sized> MessageSink for Arc<T> {
    fn consume_message(
        &self,
        msg: Message,
    ) -> BusFuture {
        (**self).consume_message(msg)
    }
}

/// Потребитель из замыкания над всем сообщением.
struct FnSink<F>(F);

impl<F> MessageSink for FnSink<F>
where
    F: Fn(Message) -> BusFuture + Send + Sync,
{
    fn consume_message(
        &self,
        msg: Message,
    ) -> BusFuture {
        (self.0)(msg)
    }
}

/// Потребитель без аргументов: само сообщение игнорируется.
struct UnitSink<F>(F);

impl<F> MessageSink for UnitSink<F>
where
    F: Fn() + Send + Sync,
{
    fn consume_message(
        &self,
        _msg: Message,
    ) -> BusFuture {
        (self.0)();
        BusFuture::ok()
    }
}

/// Потребитель одного типизированного аргумента.
struct TypedSink<T, F> {
    handler: F,
    _marker: PhantomData<fn(T)>,
}

impl<T, F> MessageSink for TypedSink<T, F>
where
    T: DeserializeOwned,
    F: Fn(T) + Send + Sync,
{
    fn consume_message(
        &self,
        msg: Message,
    ) -> BusFuture {
        match msg.decode::<T>() {
            Ok(value) => {
                (self.handler)(value);
                BusFuture::ok()
            }
            Err(err) => BusFuture::failed(err),
        }
    }
}

/// Оборачивает замыкание `Fn(Message) -> BusFuture`.
pub fn sink_fn<F>(handler: F) -> SinkRef
where
    F: Fn(Message) -> BusFuture + Send + Sync + 'static,
{
    Arc::new(FnSink(handler))
}

/// Оборачивает замыкание без аргументов.
pub fn sink_unit<F>(handler: F) -> SinkRef
where
    F: Fn() + Send + Sync + 'static,
{
    Arc::new(UnitSink(handler))
}

/// Оборачивает замыкание над одним значением типа `T`.
///
/// Сообщение декодируется перед вызовом; при ошибке декодирования
/// обработчик не вызывается, а future содержит [`HubError::Decode`].
pub fn sink_typed<T, F>(handler: F) -> SinkRef
where
    T: DeserializeOwned + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    Arc::new(TypedSink {
        handler,
        _marker: PhantomData,
    })
}

/// Потребитель, пересылающий сообщения в канал tokio.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Message>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn into_ref(self) -> SinkRef {
        Arc::new(self)
    }
}

impl fmt::Debug for ChannelSink {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ChannelSink")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl MessageSink for ChannelSink {
    fn consume_message(
        &self,
        msg: Message,
    ) -> BusFuture {
        match self.tx.send(msg) {
            Ok(()) => BusFuture::ok(),
            Err(_) => BusFuture::failed(HubError::Closed),
        }
    }
}
