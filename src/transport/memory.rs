use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
};

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, trace, warn};

use super::{InboundHandler, Transport};
use crate::{topic::TopicFilter, BusFuture, HubError};

/// Сообщение в очереди доставки клиента.
struct Delivery {
    topic: String,
    payload: Bytes,
    retained: bool,
}

/// Подключённый клиент шины.
struct ClientSlot {
    client_id: String,
    filters: HashMap<String, TopicFilter>,
    tx: mpsc::UnboundedSender<Delivery>,
}

impl ClientSlot {
    fn matches(
        &self,
        topic: &str,
    ) -> bool {
        self.filters.values().any(|f| f.matches(topic))
    }
}

/// Внутрипроцессная шина сообщений с MQTT-семантикой.
///
/// Поддерживает:
/// - фильтры с `+` и `#`
/// - retained-сообщения: последнее значение топика отдаётся новым
///   подписчикам с флагом `retained = true`, пустой payload его стирает
/// - одну доставку на клиента, даже если совпало несколько его фильтров
///
/// Каждый клиент получает сообщения на отдельной задаче tokio, поэтому
/// обработчик может публиковать обратно в шину без взаимоблокировок.
#[derive(Clone, Default)]
pub struct MemoryBus {
    /// Подключённые клиенты → слот с фильтрами и очередью.
    clients: Arc<DashMap<u64, ClientSlot>>,
    /// Топик → последнее retained-значение.
    retained: Arc<DashMap<String, Bytes>>,
    next_id: Arc<AtomicU64>,
    /// Общее количество вызовов `publish`.
    pub publish_count: Arc<AtomicUsize>,
    /// Количество доставок клиентам (включая retained).
    pub delivery_count: Arc<AtomicUsize>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Создаёт клиента шины. Клиент получает сообщения только после
    /// `connect()`.
    pub fn transport(
        &self,
        client_id: impl Into<String>,
    ) -> MemoryTransport {
        MemoryTransport {
            bus: self.clone(),
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            client_id: client_id.into(),
            handler: Arc::new(RwLock::new(None)),
            connected: AtomicBool::new(false),
            task: Mutex::new(None),
            subscribe_requests: AtomicUsize::new(0),
            unsubscribe_requests: AtomicUsize::new(0),
        }
    }

    /// Текущее retained-значение топика.
    pub fn retained(
        &self,
        topic: &str,
    ) -> Option<Bytes> {
        self.retained.get(topic).map(|v| v.value().clone())
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    fn route(
        &self,
        topic: &str,
        payload: &Bytes,
    ) -> usize {
        let mut delivered = 0;
        for slot in self.clients.iter() {
            if !slot.matches(topic) {
                continue;
            }
            let delivery = Delivery {
                topic: topic.to_string(),
                payload: payload.clone(),
                retained: false,
            };
            if slot.tx.send(delivery).is_ok() {
                delivered += 1;
            } else {
                warn!(client_id = %slot.client_id, topic, "delivery queue closed");
            }
        }
        self.delivery_count.fetch_add(delivered, Ordering::Relaxed);
        delivered
    }
}

/// Клиент [`MemoryBus`], реализующий [`Transport`].
pub struct MemoryTransport {
    bus: MemoryBus,
    id: u64,
    client_id: String,
    handler: Arc<RwLock<Option<InboundHandler>>>,
    connected: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
    subscribe_requests: AtomicUsize,
    unsubscribe_requests: AtomicUsize,
}

impl MemoryTransport {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Количество запросов SUBSCRIBE, отправленных этим клиентом.
    pub fn subscribe_requests(&self) -> usize {
        self.subscribe_requests.load(Ordering::Relaxed)
    }

    pub fn unsubscribe_requests(&self) -> usize {
        self.unsubscribe_requests.load(Ordering::Relaxed)
    }

    /// Фильтры, на которые клиент сейчас подписан.
    pub fn subscriptions(&self) -> Vec<String> {
        let mut filters: Vec<String> = self
            .bus
            .clients
            .get(&self.id)
            .map(|slot| slot.filters.keys().cloned().collect())
            .unwrap_or_default();
        filters.sort();
        filters
    }

    fn not_connected() -> BusFuture {
        BusFuture::failed(HubError::transport("client is not connected"))
    }

    fn shutdown(&self) {
        self.bus.clients.remove(&self.id);
        self.connected.store(false, Ordering::Release);
    }
}

impl Transport for MemoryTransport {
    fn connect(&self) -> BusFuture {
        if self.is_connected() {
            return BusFuture::ok();
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => return BusFuture::failed(HubError::transport(e.to_string())),
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<Delivery>();
        self.bus.clients.insert(
            self.id,
            ClientSlot {
                client_id: self.client_id.clone(),
                filters: HashMap::new(),
                tx,
            },
        );

        let handler = self.handler.clone();
        let task = runtime.spawn(async move {
            while let Some(delivery) = rx.recv().await {
                let current = handler.read().clone();
                if let Some(handler) = current {
                    handler(&delivery.topic, delivery.payload, delivery.retained);
                }
            }
        });
        *self.task.lock() = Some(task);
        self.connected.store(true, Ordering::Release);
        debug!(client_id = %self.client_id, "memory transport connected");
        BusFuture::ok()
    }

    fn disconnect(&self) -> BusFuture {
        self.shutdown();
        // Задача доставки завершится сама, дочитав очередь.
        self.task.lock().take();
        debug!(client_id = %self.client_id, "memory transport disconnected");
        BusFuture::ok()
    }

    fn subscribe(
        &self,
        filters: &[String],
    ) -> BusFuture {
        let Some(mut slot) = self.bus.clients.get_mut(&self.id) else {
            return Self::not_connected();
        };
        self.subscribe_requests.fetch_add(1, Ordering::Relaxed);

        let mut added = Vec::new();
        for filter in filters {
            if !slot.filters.contains_key(filter) {
                let parsed = TopicFilter::parse(filter);
                slot.filters.insert(filter.clone(), parsed.clone());
                added.push(parsed);
            }
        }

        let mut replayed = 0;
        for entry in self.bus.retained.iter() {
            if added.iter().any(|f| f.matches(entry.key())) {
                let delivery = Delivery {
                    topic: entry.key().clone(),
                    payload: entry.value().clone(),
                    retained: true,
                };
                if slot.tx.send(delivery).is_ok() {
                    replayed += 1;
                }
            }
        }
        self.bus
            .delivery_count
            .fetch_add(replayed, Ordering::Relaxed);
        trace!(client_id = %self.client_id, ?filters, replayed, "subscribed");
        BusFuture::ok()
    }

    fn unsubscribe(
        &self,
        filters: &[String],
    ) -> BusFuture {
        let Some(mut slot) = self.bus.clients.get_mut(&self.id) else {
            return Self::not_connected();
        };
        self.unsubscribe_requests.fetch_add(1, Ordering::Relaxed);
        for filter in filters {
            slot.filters.remove(filter);
        }
        trace!(client_id = %self.client_id, ?filters, "unsubscribed");
        BusFuture::ok()
    }

    fn publish(
        &self,
        topic: &str,
        payload: Bytes,
        retain: bool,
    ) -> BusFuture {
        if !self.is_connected() {
            return Self::not_connected();
        }
        self.bus.publish_count.fetch_add(1, Ordering::Relaxed);
        if retain {
            if payload.is_empty() {
                self.bus.retained.remove(topic);
            } else {
                self.bus.retained.insert(topic.to_string(), payload.clone());
            }
        }
        let delivered = self.bus.route(topic, &payload);
        trace!(client_id = %self.client_id, topic, retain, delivered, "published");
        BusFuture::ok()
    }

    fn on_message(
        &self,
        handler: InboundHandler,
    ) {
        *self.handler.write() = Some(handler);
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}
