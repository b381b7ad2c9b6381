use std::{fmt, sync::Arc};

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use tracing::trace;

use super::{sink_fn, sink_typed, MessageSink, MessageSource, SinkRef};
use crate::{BusFuture, HubError, Message};

/// Точка данных: источник значений компонента.
///
/// Держит ровно одного текущего потребителя. Пока потребитель не привязан
/// (компонент не опубликован), `update` сразу возвращает
/// [`HubError::NoMessageSink`].
pub struct DataPoint {
    name: String,
    retain: bool,
    sink: RwLock<Option<SinkRef>>,
}

impl DataPoint {
    /// Точка данных, чьи обновления публикуются как события.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            retain: false,
            sink: RwLock::new(None),
        }
    }

    /// Точка данных, чьи обновления публикуются как состояние (retain).
    pub fn retained(name: impl Into<String>) -> Self {
        Self {
            retain: true,
            ..Self::new(name)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_retained(&self) -> bool {
        self.retain
    }

    pub fn is_bound(&self) -> bool {
        self.sink.read().is_some()
    }

    /// Публикует новое значение.
    pub fn update<T: Serialize>(
        &self,
        value: T,
    ) -> BusFuture {
        match serde_json::to_value(value) {
            Ok(value) => self.update_message(Message::new(value, self.retain)),
            Err(e) => BusFuture::failed(HubError::Encode {
                reason: e.to_string(),
            }),
        }
    }

    /// Публикует готовое сообщение без изменений.
    pub fn update_message(
        &self,
        msg: Message,
    ) -> BusFuture {
        // Клон снимается под блокировкой, вызов потребителя идёт без неё.
        let sink = self.sink.read().clone();
        match sink {
            Some(sink) => sink.consume_message(msg),
            None => {
                trace!(data_point = %self.name, "update dropped: not bound");
                BusFuture::failed(HubError::NoMessageSink)
            }
        }
    }
}

impl MessageSource for DataPoint {
    fn sink_message(
        &self,
        sink: Option<SinkRef>,
    ) {
        *self.sink.write() = sink;
    }
}

impl fmt::Debug for DataPoint {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("DataPoint")
            .field("name", &self.name)
            .field("retain", &self.retain)
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// Реактор: принимает команды, адресованные компоненту.
pub struct Reactor {
    name: String,
    handler: RwLock<SinkRef>,
}

impl Reactor {
    pub fn new(
        name: impl Into<String>,
        handler: SinkRef,
    ) -> Self {
        Self {
            name: name.into(),
            handler: RwLock::new(handler),
        }
    }

    /// Реактор над замыканием `Fn(Message) -> BusFuture`.
    pub fn from_fn<F>(
        name: impl Into<String>,
        handler: F,
    ) -> Self
    where
        F: Fn(Message) -> BusFuture + Send + Sync + 'static,
    {
        Self::new(name, sink_fn(handler))
    }

    /// Реактор над замыканием одного типизированного аргумента.
    pub fn typed<T, F>(
        name: impl Into<String>,
        handler: F,
    ) -> Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::new(name, sink_typed(handler))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Заменяет обработчик команд.
    pub fn set_handler(
        &self,
        handler: SinkRef,
    ) {
        *self.handler.write() = handler;
    }
}

impl MessageSink for Reactor {
    fn consume_message(
        &self,
        msg: Message,
    ) -> BusFuture {
        let handler = self.handler.read().clone();
        handler.consume_message(msg)
    }
}

impl fmt::Debug for Reactor {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Reactor").field("name", &self.name).finish()
    }
}

/// Endpoint компонента с явно объявленными возможностями.
///
/// `source` — endpoint публикует значения (точка данных), `sink` —
/// endpoint принимает команды (реактор). Допустимы обе возможности сразу.
#[derive(Clone)]
pub struct Endpoint {
    name: String,
    source: Option<Arc<dyn MessageSource>>,
    sink: Option<SinkRef>,
}

impl Endpoint {
    /// Endpoint без возможностей; дополняется через `with_*`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            sink: None,
        }
    }

    pub fn with_source(
        mut self,
        source: Arc<dyn MessageSource>,
    ) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_sink(
        mut self,
        sink: SinkRef,
    ) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> Option<&Arc<dyn MessageSource>> {
        self.source.as_ref()
    }

    pub fn sink(&self) -> Option<&SinkRef> {
        self.sink.as_ref()
    }
}

impl From<Arc<DataPoint>> for Endpoint {
    fn from(point: Arc<DataPoint>) -> Self {
        Endpoint::new(point.name()).with_source(point)
    }
}

impl From<Arc<Reactor>> for Endpoint {
    fn from(reactor: Arc<Reactor>) -> Self {
        Endpoint::new(reactor.name()).with_sink(reactor)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("source", &self.source.is_some())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
