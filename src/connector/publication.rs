use std::{
    collections::BTreeMap,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
};

use tracing::{debug, trace};

use super::{publish_weak, ConnectorShared};
use crate::{
    hub::{Component, ComponentRef, MessageSink, MessageSource, SinkRef},
    pubsub::HandlerRef,
    topic::{actor_topic, data_topic, join},
    BusFuture, HubError, HubResult, Message,
};

/// Таблицы адресов экспортируемого дерева компонентов.
///
/// Строится обходом в глубину без побочных эффектов: точки данных
/// получают исходящие топики `<path>/:/<name>`, реакторы — входящие
/// `<path>/!/<name>`, вложенные компоненты — путь `<path>/<id>`.
#[derive(Clone, Default)]
pub struct AddressTable {
    emits: BTreeMap<String, Arc<dyn MessageSource>>,
    sinks: BTreeMap<String, SinkRef>,
}

impl AddressTable {
    pub fn build(
        base: &str,
        component: &dyn Component,
    ) -> Self {
        let mut table = Self::default();
        table.populate(base, component);
        table
    }

    fn populate(
        &mut self,
        base: &str,
        component: &dyn Component,
    ) {
        for endpoint in component.endpoints() {
            if let Some(source) = endpoint.source() {
                self.emits
                    .insert(data_topic(base, endpoint.name()), source.clone());
            }
            if let Some(sink) = endpoint.sink() {
                self.sinks
                    .insert(actor_topic(base, endpoint.name()), sink.clone());
            }
        }
        for child in component.components() {
            self.populate(&join(base, child.id()), child.as_ref());
        }
    }

    /// Исходящие топики точек данных.
    pub fn emit_topics(&self) -> Vec<String> {
        self.emits.keys().cloned().collect()
    }

    /// Входящие топики реакторов.
    pub fn sink_topics(&self) -> Vec<String> {
        self.sinks.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.emits.is_empty() && self.sinks.is_empty()
    }
}

impl fmt::Debug for AddressTable {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("AddressTable")
            .field("emits", &self.emits.keys().collect::<Vec<_>>())
            .field("sinks", &self.sinks.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Отправитель, привязанный к точке данных: публикует её обновления в
/// исходящий топик с retain, равным флагу состояния сообщения.
struct DataEmitter {
    conn: Weak<ConnectorShared>,
    topic: String,
}

impl MessageSink for DataEmitter {
    fn consume_message(
        &self,
        msg: Message,
    ) -> BusFuture {
        publish_weak(&self.conn, &self.topic, &msg, msg.is_state())
    }
}

/// Экспортированный компонент.
///
/// Клоны ссылаются на одну и ту же публикацию. `close` идемпотентен.
#[derive(Clone)]
pub struct Publication {
    inner: Arc<PublicationInner>,
}

struct PublicationInner {
    conn: Weak<ConnectorShared>,
    component: ComponentRef,
    topic: String,
    table: AddressTable,
    filters: Vec<String>,
    handler: HandlerRef,
    closed: AtomicBool,
}

impl Publication {
    pub(crate) fn new(
        conn: &Arc<ConnectorShared>,
        component: ComponentRef,
        topic: String,
        table: AddressTable,
    ) -> Self {
        let sinks = Arc::new(table.sinks.clone());
        let handler = HandlerRef::new(move |topic, msg| match sinks.get(topic) {
            // Реактор вызывается прямо на задаче транспорта.
            Some(sink) => {
                let _ = sink.consume_message(msg.clone());
            }
            None => trace!(topic, "no reactor for topic"),
        });
        Self {
            inner: Arc::new(PublicationInner {
                conn: Arc::downgrade(conn),
                component,
                topic,
                filters: table.sink_topics(),
                table,
                handler,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn component(&self) -> &ComponentRef {
        &self.inner.component
    }

    /// Полный топик корневого компонента.
    pub fn topic(&self) -> &str {
        &self.inner.topic
    }

    pub fn address_table(&self) -> &AddressTable {
        &self.inner.table
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Подписывается на входящие топики и привязывает точки данных.
    pub(crate) async fn export(&self) -> HubResult<()> {
        let Some(conn) = self.inner.conn.upgrade() else {
            return Err(HubError::Closed);
        };
        conn.subscribe_handler(&self.inner.filters, &self.inner.handler)
            .await?;
        for (topic, source) in &self.inner.table.emits {
            source.sink_message(Some(Arc::new(DataEmitter {
                conn: self.inner.conn.clone(),
                topic: topic.clone(),
            })));
        }
        debug!(
            topic = %self.inner.topic,
            emits = self.inner.table.emits.len(),
            sinks = self.inner.table.sinks.len(),
            "component exported"
        );
        Ok(())
    }

    /// Отвязывает точки данных и отписывается от входящих топиков.
    ///
    /// Повторный вызов ничего не делает.
    pub fn close(&self) -> BusFuture {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return BusFuture::ok();
        }
        for source in self.inner.table.emits.values() {
            source.sink_message(None);
        }
        let Some(conn) = self.inner.conn.upgrade() else {
            return BusFuture::ok();
        };
        conn.remove_export(self);
        debug!(topic = %self.inner.topic, "component unexported");
        conn.unsubscribe_handler(&self.inner.filters, &self.inner.handler)
    }

    pub(crate) fn same(
        &self,
        other: &Publication,
    ) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Publication {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Publication")
            .field("topic", &self.inner.topic)
            .field("table", &self.inner.table)
            .field("closed", &self.is_closed())
            .finish()
    }
}
