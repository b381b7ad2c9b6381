//! Граница с физическим транспортом шины.
//!
//! Ядро хаба требует от транспорта только подписку, отписку, публикацию и
//! обратный вызов на входящие сообщения. Всё остальное (соединение, TLS,
//! QoS, переподключение) — забота конкретной реализации.

pub mod memory;

use std::sync::Arc;

use bytes::Bytes;

pub use memory::{MemoryBus, MemoryTransport};

use crate::BusFuture;

/// Обработчик входящих сообщений: `(topic, payload, retained)`.
///
/// Вызывается на потоке/задаче транспорта и не должен блокироваться.
pub type InboundHandler = Arc<dyn Fn(&str, Bytes, bool) + Send + Sync>;

/// Транспорт шины сообщений с MQTT-подобной семантикой.
pub trait Transport: Send + Sync {
    /// Устанавливает соединение.
    fn connect(&self) -> BusFuture;

    fn disconnect(&self) -> BusFuture;

    /// Подписка на набор фильтров одним запросом.
    fn subscribe(
        &self,
        filters: &[String],
    ) -> BusFuture;

    fn unsubscribe(
        &self,
        filters: &[String],
    ) -> BusFuture;

    /// Публикация. `retain` сохраняет сообщение как текущее значение топика.
    fn publish(
        &self,
        topic: &str,
        payload: Bytes,
        retain: bool,
    ) -> BusFuture;

    /// Устанавливает единственный обработчик входящих сообщений.
    fn on_message(
        &self,
        handler: InboundHandler,
    );
}

pub type TransportRef = Arc<dyn Transport>;
