use std::{fmt, sync::Arc};

use parking_lot::Mutex;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};

use super::Connector;
use crate::{
    hub::SinkRef,
    pubsub::HandlerRef,
    topic::EndpointKind,
    BusFuture, HubResult, Message,
};

/// Какие входящие сообщения доставляются наблюдателю.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchScope {
    /// Сообщения любых endpoint-ов (точки данных и команды).
    AllEndpoints,
    /// Только сообщения точек данных.
    DataPoints,
}

impl WatchScope {
    fn accepts(
        self,
        msg: &Message,
    ) -> bool {
        match self {
            Self::AllEndpoints => true,
            Self::DataPoints => msg.kind() == Some(EndpointKind::DataPoint),
        }
    }
}

type Producer = Arc<Mutex<Option<mpsc::UnboundedSender<Message>>>>;

/// Активное наблюдение.
///
/// Обратный вызов транспорта только ставит сообщение в очередь; отдельная
/// задача доставки вызывает потребителя. `close` снимает обработчик,
/// дожидается опустошения очереди и отписывается, если группа опустела.
/// При уничтожении без `close` отписка запускается без ожидания.
pub struct Watcher {
    conn: Connector,
    filters: Vec<String>,
    handler: HandlerRef,
    producer: Producer,
    task: Option<JoinHandle<()>>,
    closed: bool,
}

impl Watcher {
    pub(crate) async fn start(
        conn: Connector,
        filters: Vec<String>,
        scope: WatchScope,
        sink: SinkRef,
    ) -> HubResult<Watcher> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let producer: Producer = Arc::new(Mutex::new(Some(tx)));

        let handler = {
            let producer = producer.clone();
            HandlerRef::new(move |_, msg| {
                if !scope.accepts(msg) {
                    return;
                }
                if let Some(tx) = producer.lock().as_ref() {
                    let _ = tx.send(msg.clone());
                }
            })
        };

        conn.shared().subscribe_handler(&filters, &handler).await?;
        debug!(?filters, ?scope, "watch started");

        // Сообщения, пришедшие до запуска задачи, ждут в очереди.
        let task = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let topic = format!("{}/{}", msg.component(), msg.endpoint());
                let mut fut = sink.consume_message(msg);
                if let Some(Err(err)) = fut.try_result() {
                    warn!(%topic, error = %err, "watch sink rejected message");
                }
            }
        });

        Ok(Watcher {
            conn,
            filters,
            handler,
            producer,
            task: Some(task),
            closed: false,
        })
    }

    /// Фильтры, под которыми зарегистрирован наблюдатель.
    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    /// Завершает наблюдение.
    ///
    /// Возвращает результат отписки (если она понадобилась).
    pub async fn close(mut self) -> HubResult<()> {
        let unsubscribe = self.detach();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "watch delivery task failed");
            }
        }
        unsubscribe.await
    }

    /// Снимает обработчик и закрывает очередь. Возвращает future отписки.
    fn detach(&mut self) -> BusFuture {
        if self.closed {
            return BusFuture::ok();
        }
        self.closed = true;
        let unsubscribe = self
            .conn
            .shared()
            .unsubscribe_handler(&self.filters, &self.handler);
        self.producer.lock().take();
        debug!(filters = ?self.filters, "watch closed");
        unsubscribe
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        let _ = self.detach();
    }
}

impl fmt::Debug for Watcher {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("filters", &self.filters)
            .field("closed", &self.closed)
            .finish()
    }
}
