//! Коннектор: связывает дерево компонентов и удалённые адреса с
//! транспортом шины.
//!
//! - `options`: параметры подключения.
//! - `publication`: экспорт компонента (таблицы адресов, привязка).
//! - `descriptor`: удалённые адреса компонентов и endpoint-ов.
//! - `watcher`: живая подписка с отдельной задачей доставки.
//! - `registry`: выбор транспорта по схеме URL.

pub mod descriptor;
pub mod options;
pub mod publication;
pub mod registry;
pub mod watcher;

use std::{
    fmt,
    sync::{Arc, Weak},
};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

pub use descriptor::*;
pub use options::*;
pub use publication::*;
pub use registry::*;
pub use watcher::*;

use crate::{
    hub::{ComponentRef, SinkRef},
    pubsub::{HandlerRef, TopicHandlerMap},
    topic::{join, normalize_namespace, parse_topic_with_prefix, MULTI_LEVEL_WILDCARD},
    transport::TransportRef,
    BusFuture, HubError, HubResult, Message,
};

/// Коннектор к шине сообщений.
///
/// Дешёвый в клонировании дескриптор общего состояния: все клоны
/// разделяют транспорт, мультиплексор подписок и список экспортов.
#[derive(Clone)]
pub struct Connector {
    shared: Arc<ConnectorShared>,
}

pub(crate) struct ConnectorShared {
    transport: TransportRef,
    /// Нормализованный префикс (`ns/` или пустая строка).
    prefix: String,
    client_id: String,
    handlers: TopicHandlerMap,
    exports: Mutex<Vec<Publication>>,
}

impl Connector {
    /// Создаёт коннектор поверх транспорта и устанавливает обработчик
    /// входящих сообщений. Соединение не открывается.
    pub fn new(
        transport: TransportRef,
        mut options: ConnectorOptions,
    ) -> Self {
        let client_id = options.ensure_client_id().to_string();
        let shared = Arc::new(ConnectorShared {
            transport,
            prefix: normalize_namespace(&options.namespace),
            client_id,
            handlers: TopicHandlerMap::with_dedup(options.dedup_handlers),
            exports: Mutex::new(Vec::new()),
        });

        let weak = Arc::downgrade(&shared);
        shared
            .transport
            .on_message(Arc::new(move |topic: &str, payload: Bytes, retained: bool| {
                if let Some(shared) = weak.upgrade() {
                    shared.handle_inbound(topic, payload, retained);
                }
            }));

        Self { shared }
    }

    pub fn connect(&self) -> BusFuture {
        self.shared.transport.connect()
    }

    /// Закрывает соединение транспорта. Экспорты и наблюдатели не
    /// закрываются: их следует закрыть раньше.
    pub fn disconnect(&self) -> BusFuture {
        self.shared.transport.disconnect()
    }

    /// Пространство имён без завершающего `/`.
    pub fn namespace(&self) -> &str {
        self.shared.prefix.trim_end_matches('/')
    }

    pub fn client_id(&self) -> &str {
        &self.shared.client_id
    }

    pub fn transport(&self) -> &TransportRef {
        &self.shared.transport
    }

    /// Экспортирует компонент в шину.
    ///
    /// Возвращается после подтверждения подписки на все топики реакторов.
    /// При ошибке подписки ни одна точка данных не привязана.
    pub async fn publish(
        &self,
        component: ComponentRef,
    ) -> HubResult<Publication> {
        let topic = join(&self.shared.prefix, component.id());
        let table = AddressTable::build(&topic, component.as_ref());
        let publication = Publication::new(&self.shared, component, topic, table);
        publication.export().await?;
        self.shared.exports.lock().push(publication.clone());
        Ok(publication)
    }

    /// Описатель удалённого компонента верхнего уровня.
    pub fn describe(
        &self,
        component_id: &str,
    ) -> Descriptor {
        Descriptor::new(
            self.clone(),
            component_id,
            join(&self.shared.prefix, component_id),
        )
    }

    /// Наблюдение за всеми endpoint-ами пространства имён.
    pub async fn watch(
        &self,
        sink: SinkRef,
    ) -> HubResult<Watcher> {
        let filter = join(&self.shared.prefix, MULTI_LEVEL_WILDCARD);
        Watcher::start(self.clone(), vec![filter], WatchScope::AllEndpoints, sink).await
    }

    /// Количество активных экспортов.
    pub fn publication_count(&self) -> usize {
        self.shared.exports.lock().len()
    }

    /// Количество групп мультиплексора, то есть физических подписок.
    pub fn subscription_count(&self) -> usize {
        self.shared.handlers.group_count()
    }

    pub(crate) fn shared(&self) -> &Arc<ConnectorShared> {
        &self.shared
    }
}

impl fmt::Debug for Connector {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Connector")
            .field("namespace", &self.namespace())
            .field("client_id", &self.shared.client_id)
            .field("subscriptions", &self.shared.handlers.group_count())
            .finish()
    }
}

impl ConnectorShared {
    fn handle_inbound(
        &self,
        topic: &str,
        payload: Bytes,
        retained: bool,
    ) {
        let Some(addr) = parse_topic_with_prefix(topic, &self.prefix) else {
            trace!(topic, "ignoring non-endpoint topic");
            return;
        };
        let msg = Message::inbound(addr.component, addr.endpoint, addr.kind, payload, retained);
        self.handlers.dispatch(topic, &msg);
    }

    /// Регистрирует обработчик и подписывается на новые группы.
    ///
    /// Возвращается, когда все фильтры обработчика подписаны на транспорте,
    /// включая группы, созданные конкурентными вызовами. При отказе группы,
    /// созданные этим вызовом, удаляются вместе с присоединившимися к ним
    /// обработчиками, а сам обработчик снимается со всех фильтров.
    pub(crate) async fn subscribe_handler(
        &self,
        filters: &[String],
        handler: &HandlerRef,
    ) -> HubResult<()> {
        let mut registration = self.handlers.add(filters, handler);
        if !registration.subs.is_empty() {
            debug!(client_id = %self.client_id, subs = ?registration.subs, "subscribing");
            match self.transport.subscribe(&registration.subs).await {
                Ok(()) => self.handlers.mark_ready(&registration.subs),
                Err(err) => {
                    debug!(client_id = %self.client_id, error = %err, "subscribe rejected");
                    self.handlers.fail(&registration.subs, &err);
                    self.rollback_handler(filters, handler).await;
                    return Err(err);
                }
            }
        }
        for group in &mut registration.pending {
            if let Err(err) = group.ready().await {
                debug!(
                    client_id = %self.client_id,
                    filter = group.filter(),
                    error = %err,
                    "shared subscription failed"
                );
                self.rollback_handler(filters, handler).await;
                return Err(err);
            }
        }
        Ok(())
    }

    /// Снимает обработчик после неудачной подписки. Опустевшие группы
    /// были подписаны ранее и требуют UNSUBSCRIBE.
    async fn rollback_handler(
        &self,
        filters: &[String],
        handler: &HandlerRef,
    ) {
        let unsubs = self.handlers.remove(filters, handler);
        if unsubs.is_empty() {
            return;
        }
        if let Err(err) = self.transport.unsubscribe(&unsubs).await {
            warn!(
                client_id = %self.client_id,
                ?unsubs,
                error = %err,
                "rollback unsubscribe failed"
            );
        }
    }

    /// Снимает обработчик и отписывается от опустевших групп.
    pub(crate) fn unsubscribe_handler(
        &self,
        filters: &[String],
        handler: &HandlerRef,
    ) -> BusFuture {
        let unsubs = self.handlers.remove(filters, handler);
        if unsubs.is_empty() {
            return BusFuture::ok();
        }
        debug!(client_id = %self.client_id, ?unsubs, "unsubscribing");
        self.transport.unsubscribe(&unsubs)
    }

    /// Кодирует и публикует сообщение в топик.
    pub(crate) fn publish_message(
        &self,
        topic: &str,
        msg: &Message,
        retain: bool,
    ) -> BusFuture {
        match msg.encode() {
            Ok(payload) => self.transport.publish(topic, payload, retain),
            Err(err) => BusFuture::failed(err),
        }
    }

    pub(crate) fn remove_export(
        &self,
        publication: &Publication,
    ) {
        self.exports.lock().retain(|p| !p.same(publication));
    }
}

/// Публикация через слабую ссылку на коннектор: отправители, хранимые в
/// компонентах, не продлевают жизнь коннектора.
pub(crate) fn publish_weak(
    conn: &Weak<ConnectorShared>,
    topic: &str,
    msg: &Message,
    retain: bool,
) -> BusFuture {
    match conn.upgrade() {
        Some(shared) => shared.publish_message(topic, msg, retain),
        None => BusFuture::failed(HubError::Closed),
    }
}
