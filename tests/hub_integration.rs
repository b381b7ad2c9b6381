use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::{
    sync::mpsc::UnboundedReceiver,
    time::{sleep, timeout},
};
use topichub::{
    sink_fn, sink_typed, BasicComponent, BusFuture, ChannelSink, Connector, ConnectorOptions,
    DataPoint, EndpointKind, HubError, InboundHandler, MemoryBus, MemoryTransport, Message,
    MessageSink, Reactor, Transport,
};

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(200);

async fn open(
    bus: &MemoryBus,
    client_id: &str,
) -> (Arc<MemoryTransport>, Connector) {
    let transport = Arc::new(bus.transport(client_id));
    let conn = Connector::new(
        transport.clone(),
        ConnectorOptions::new()
            .namespace("lab")
            .client_id(client_id),
    );
    conn.connect().await.unwrap();
    (transport, conn)
}

/// `pub0/comp0` с точками `state0` (retain), `state1` и реактором `a`,
/// пересылающим команду в `state0`.
fn sample() -> (BasicComponent, Arc<DataPoint>) {
    let state0 = Arc::new(DataPoint::retained("state0"));
    let forward = {
        let state0 = state0.clone();
        Reactor::typed("a", move |value: i64| {
            let _ = state0.update(value);
        })
    };
    let comp0 = BasicComponent::new("comp0")
        .with_endpoint(state0.clone())
        .with_endpoint(Arc::new(DataPoint::new("state1")))
        .with_endpoint(Arc::new(forward));
    (BasicComponent::new("pub0").with_component(comp0), state0)
}

async fn recv(rx: &mut UnboundedReceiver<Message>) -> Message {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("watch channel closed")
}

async fn assert_quiet(rx: &mut UnboundedReceiver<Message>) {
    if let Ok(Some(msg)) = timeout(QUIET, rx.recv()).await {
        panic!("unexpected message: {msg:?}");
    }
}

/// Тест проверяет, что два наблюдателя одного фильтра дают одну
/// физическую подписку и оба получают обновления, а отписка происходит
/// только после закрытия последнего.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shared_subscription_lifecycle() {
    let bus = MemoryBus::new();
    let (_, host) = open(&bus, "host").await;
    let (transport, client) = open(&bus, "client").await;

    let (component, state0) = sample();
    let _publication = host.publish(component.into_ref()).await.unwrap();

    let state = client
        .describe("pub0")
        .sub_component(&["comp0"])
        .endpoint("state0");
    let (sink1, mut rx1) = ChannelSink::new();
    let (sink2, mut rx2) = ChannelSink::new();
    let watcher1 = state.watch(sink1.into_ref()).await.unwrap();
    let watcher2 = state.watch(sink2.into_ref()).await.unwrap();

    assert_eq!(transport.subscribe_requests(), 1);
    assert_eq!(client.subscription_count(), 1);

    state0.update(5).await.unwrap();
    assert_eq!(recv(&mut rx1).await.decode::<i64>().unwrap(), 5);
    assert_eq!(recv(&mut rx2).await.decode::<i64>().unwrap(), 5);

    watcher1.close().await.unwrap();
    assert_eq!(transport.unsubscribe_requests(), 0);
    assert_eq!(transport.subscriptions(), vec!["lab/pub0/comp0/:/state0"]);

    state0.update(6).await.unwrap();
    assert_eq!(recv(&mut rx2).await.decode::<i64>().unwrap(), 6);

    watcher2.close().await.unwrap();
    assert_eq!(transport.unsubscribe_requests(), 1);
    assert!(transport.subscriptions().is_empty());
    assert_eq!(client.subscription_count(), 0);
}

/// Тест проверяет, что retained-значение доходит до клиента, подписавшегося
/// после публикации, и помечено как состояние.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_retained_state_reaches_late_watcher() {
    let bus = MemoryBus::new();
    let (_, host) = open(&bus, "host").await;

    let (component, state0) = sample();
    let _publication = host.publish(component.into_ref()).await.unwrap();
    state0.update(2).await.unwrap();
    assert!(bus.retained("lab/pub0/comp0/:/state0").is_some());

    let (_, late) = open(&bus, "late").await;
    let (sink, mut rx) = ChannelSink::new();
    let _watcher = late
        .describe("pub0")
        .sub_component(&["comp0"])
        .endpoint("state0")
        .watch(sink.into_ref())
        .await
        .unwrap();

    let msg = recv(&mut rx).await;
    assert!(msg.is_state());
    assert_eq!(msg.component(), "pub0/comp0");
    assert_eq!(msg.endpoint(), "state0");
    assert_eq!(msg.decode::<i64>().unwrap(), 2);
}

/// Тест проверяет полный цикл: команда реактору пересылается в точку
/// данных, и наблюдатель видит обновление.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reactor_command_roundtrip() {
    let bus = MemoryBus::new();
    let (_, host) = open(&bus, "host").await;
    let (_, client) = open(&bus, "client").await;

    let (component, _) = sample();
    let _publication = host.publish(component.into_ref()).await.unwrap();

    let desc = client.describe("pub0").sub_component(&["comp0"]);
    let (sink, mut rx) = ChannelSink::new();
    let _watcher = desc.endpoint("state0").watch(sink.into_ref()).await.unwrap();

    desc.endpoint("a")
        .reactor()
        .unwrap()
        .consume_message(Message::event(7))
        .await
        .unwrap();

    let msg = recv(&mut rx).await;
    assert_eq!(msg.kind(), Some(EndpointKind::DataPoint));
    // Живая доставка идёт без retain-бита даже для state-точки.
    assert!(!msg.is_state());
    assert_eq!(msg.decode::<i64>().unwrap(), 7);
}

/// Тест проверяет, что `EndpointRef` сам по себе является потребителем:
/// отправка в него эквивалентна отправке в реактор.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_endpoint_ref_as_sink() {
    let bus = MemoryBus::new();
    let (_, host) = open(&bus, "host").await;
    let (_, client) = open(&bus, "client").await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let reactor = Reactor::from_fn("set", move |msg| {
        let _ = tx.send(msg);
        BusFuture::ok()
    });
    let component = BasicComponent::new("lamp").with_endpoint(Arc::new(reactor));
    let _publication = host.publish(component.into_ref()).await.unwrap();

    let target = client.describe("lamp").endpoint("set");
    target.consume_message(Message::event("on")).await.unwrap();

    let msg = recv(&mut rx).await;
    assert_eq!(msg.kind(), Some(EndpointKind::Actuator));
    assert!(!msg.is_state());
    assert_eq!(msg.decode::<String>().unwrap(), "on");
}

/// Тест проверяет, что наблюдение за пространством имён видит и данные,
/// и команды.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_connector_watch_sees_all_endpoints() {
    let bus = MemoryBus::new();
    let (_, host) = open(&bus, "host").await;
    let (_, client) = open(&bus, "client").await;

    let (component, _) = sample();
    let _publication = host.publish(component.into_ref()).await.unwrap();

    let (sink, mut rx) = ChannelSink::new();
    let _watcher = client.watch(sink.into_ref()).await.unwrap();

    client
        .describe("pub0")
        .sub_component(&["comp0"])
        .endpoint("a")
        .consume_message(Message::event(3))
        .await
        .unwrap();

    let mut kinds = HashSet::new();
    for _ in 0..2 {
        let msg = recv(&mut rx).await;
        assert_eq!(msg.component(), "pub0/comp0");
        kinds.insert(msg.kind());
    }
    assert!(kinds.contains(&Some(EndpointKind::DataPoint)));
    assert!(kinds.contains(&Some(EndpointKind::Actuator)));
}

/// Тест проверяет, что наблюдение за компонентом пропускает только точки
/// данных.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_descriptor_watch_filters_commands() {
    let bus = MemoryBus::new();
    let (_, host) = open(&bus, "host").await;
    let (_, client) = open(&bus, "client").await;

    let (component, _) = sample();
    let _publication = host.publish(component.into_ref()).await.unwrap();

    let desc = client.describe("pub0");
    let (sink, mut rx) = ChannelSink::new();
    let _watcher = desc.watch(sink.into_ref()).await.unwrap();

    desc.sub_component(&["comp0"])
        .endpoint("a")
        .consume_message(Message::event(9))
        .await
        .unwrap();

    let msg = recv(&mut rx).await;
    assert_eq!(msg.kind(), Some(EndpointKind::DataPoint));
    assert_eq!(msg.endpoint(), "state0");
    assert_quiet(&mut rx).await;
}

/// Тест проверяет, что `+` в подпути охватывает все подходящие
/// компоненты.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wildcard_endpoints_watch() {
    let bus = MemoryBus::new();
    let (_, host) = open(&bus, "host").await;
    let (_, client) = open(&bus, "client").await;

    let left = Arc::new(DataPoint::new("temp"));
    let right = Arc::new(DataPoint::new("temp"));
    let component = BasicComponent::new("rack")
        .with_component(BasicComponent::new("left").with_endpoint(left.clone()))
        .with_component(BasicComponent::new("right").with_endpoint(right.clone()));
    let _publication = host.publish(component.into_ref()).await.unwrap();

    let (sink, mut rx) = ChannelSink::new();
    let _watcher = client
        .describe("rack")
        .endpoints_at("+", &["temp"])
        .watch(sink.into_ref())
        .await
        .unwrap();

    left.update(20).await.unwrap();
    right.update(21).await.unwrap();

    let mut seen = HashSet::new();
    for _ in 0..2 {
        seen.insert(recv(&mut rx).await.component().to_string());
    }
    assert_eq!(
        seen,
        HashSet::from(["rack/left".to_string(), "rack/right".to_string()])
    );
}

/// Тест проверяет, что обновление непривязанной точки данных сразу
/// завершается ошибкой `NoMessageSink`.
#[tokio::test]
async fn test_unbound_update_fails_fast() {
    let point = DataPoint::retained("lonely");
    let mut fut = point.update(1);
    assert!(fut.is_ready());
    assert!(matches!(fut.wait().await, Err(HubError::NoMessageSink)));
}

/// Тест проверяет, что закрытие публикации идемпотентно и отвязывает
/// точки данных.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_publication_close_is_idempotent() {
    let bus = MemoryBus::new();
    let (transport, host) = open(&bus, "host").await;

    let (component, state0) = sample();
    let publication = host.publish(component.into_ref()).await.unwrap();
    assert!(state0.is_bound());
    assert_eq!(host.publication_count(), 1);
    assert_eq!(transport.subscriptions(), vec!["lab/pub0/comp0/!/a"]);

    publication.close().await.unwrap();
    publication.close().await.unwrap();

    assert!(publication.is_closed());
    assert!(!state0.is_bound());
    assert_eq!(host.publication_count(), 0);
    assert_eq!(transport.unsubscribe_requests(), 1);
    assert!(transport.subscriptions().is_empty());
    assert!(matches!(state0.update(1).await, Err(HubError::NoMessageSink)));
}

/// Тест проверяет, что `sub_component` без идентификаторов возвращает
/// равный описатель.
#[tokio::test]
async fn test_sub_component_identity() {
    let bus = MemoryBus::new();
    let conn = Connector::new(
        Arc::new(bus.transport("c")),
        ConnectorOptions::new().namespace("lab"),
    );
    let desc = conn.describe("pub0");
    assert_eq!(desc.sub_component::<&str>(&[]), desc);
    assert_eq!(desc.sub_component(&["comp0"]).topic(), "lab/pub0/comp0");
    assert_eq!(desc.sub_component(&["comp0"]).id(), "comp0");
}

/// Транспорт, отклоняющий любую подписку асинхронно через `delay`.
struct RejectingTransport {
    inner: MemoryTransport,
    delay: Duration,
    subscribe_requests: AtomicUsize,
}

impl RejectingTransport {
    fn new(
        inner: MemoryTransport,
        delay: Duration,
    ) -> Self {
        Self {
            inner,
            delay,
            subscribe_requests: AtomicUsize::new(0),
        }
    }
}

impl Transport for RejectingTransport {
    fn connect(&self) -> BusFuture {
        self.inner.connect()
    }

    fn disconnect(&self) -> BusFuture {
        self.inner.disconnect()
    }

    fn subscribe(
        &self,
        _filters: &[String],
    ) -> BusFuture {
        self.subscribe_requests.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay;
        let (ack, fut) = BusFuture::pending();
        tokio::spawn(async move {
            sleep(delay).await;
            ack.complete(Err(HubError::transport("subscription refused")));
        });
        fut
    }

    fn unsubscribe(
        &self,
        filters: &[String],
    ) -> BusFuture {
        self.inner.unsubscribe(filters)
    }

    fn publish(
        &self,
        topic: &str,
        payload: Bytes,
        retain: bool,
    ) -> BusFuture {
        self.inner.publish(topic, payload, retain)
    }

    fn on_message(
        &self,
        handler: InboundHandler,
    ) {
        self.inner.on_message(handler)
    }
}

/// Тест проверяет, что отказ в подписке при экспорте не оставляет ни
/// обработчиков, ни привязанных точек данных.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_export_leaves_nothing_behind() {
    let bus = MemoryBus::new();
    let transport = Arc::new(RejectingTransport::new(
        bus.transport("host"),
        Duration::ZERO,
    ));
    let host = Connector::new(transport, ConnectorOptions::new().namespace("lab"));
    host.connect().await.unwrap();

    let (component, state0) = sample();
    let err = host.publish(component.into_ref()).await.unwrap_err();

    assert!(matches!(err, HubError::Transport { .. }));
    assert!(!state0.is_bound());
    assert_eq!(host.subscription_count(), 0);
    assert_eq!(host.publication_count(), 0);
}

/// Тест проверяет, что отказ в подписке наблюдателя возвращается
/// вызывающему.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_watch_reports_error() {
    let bus = MemoryBus::new();
    let transport = Arc::new(RejectingTransport::new(
        bus.transport("client"),
        Duration::ZERO,
    ));
    let client = Connector::new(transport, ConnectorOptions::new().namespace("lab"));
    client.connect().await.unwrap();

    let (sink, _rx) = ChannelSink::new();
    let result = client.describe("pub0").watch(sink.into_ref()).await;
    assert!(matches!(result, Err(HubError::Transport { .. })));
    assert_eq!(client.subscription_count(), 0);
}

/// Тест проверяет, что наблюдатель, присоединившийся к ещё не
/// подтверждённой подписке, получает её отказ, а группа не остаётся в
/// мультиплексоре.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_joined_watch_shares_subscribe_failure() {
    let bus = MemoryBus::new();
    let transport = Arc::new(RejectingTransport::new(
        bus.transport("client"),
        Duration::from_millis(100),
    ));
    let client = Connector::new(transport.clone(), ConnectorOptions::new().namespace("lab"));
    client.connect().await.unwrap();

    let first = {
        let client = client.clone();
        tokio::spawn(async move {
            let (sink, _rx) = ChannelSink::new();
            client
                .describe("pub0")
                .endpoint("state0")
                .watch(sink.into_ref())
                .await
                .map(|_| ())
        })
    };
    sleep(Duration::from_millis(20)).await;
    assert_eq!(client.subscription_count(), 1);

    let (sink, _rx) = ChannelSink::new();
    let second = client
        .describe("pub0")
        .endpoint("state0")
        .watch(sink.into_ref())
        .await;

    assert!(matches!(second, Err(HubError::Transport { .. })));
    assert!(matches!(first.await.unwrap(), Err(HubError::Transport { .. })));
    assert_eq!(transport.subscribe_requests.load(Ordering::SeqCst), 1);
    assert_eq!(client.subscription_count(), 0);
}

/// Тест проверяет, что второй наблюдатель не возвращается раньше
/// подтверждения общей подписки и после него получает сообщения.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_joined_watch_waits_for_subscription() {
    let bus = MemoryBus::new();
    let (_, host) = open(&bus, "host").await;
    let (transport, client) = open(&bus, "client").await;

    let (component, state0) = sample();
    let _publication = host.publish(component.into_ref()).await.unwrap();

    let state = client
        .describe("pub0")
        .sub_component(&["comp0"])
        .endpoint("state0");
    let (sink1, _rx1) = ChannelSink::new();
    let (sink2, mut rx2) = ChannelSink::new();
    let (first, second) = tokio::join!(
        state.watch(sink1.into_ref()),
        state.watch(sink2.into_ref())
    );
    let (_first, _second) = (first.unwrap(), second.unwrap());

    assert_eq!(transport.subscribe_requests(), 1);
    assert_eq!(transport.subscriptions(), vec!["lab/pub0/comp0/:/state0"]);

    state0.update(4).await.unwrap();
    assert_eq!(recv(&mut rx2).await.decode::<i64>().unwrap(), 4);
}

/// Тест проверяет, что ошибка декодирования у одного потребителя не мешает
/// другому потребителю того же фильтра получить сообщение.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_decode_failure_is_isolated() {
    let bus = MemoryBus::new();
    let (_, host) = open(&bus, "host").await;
    let (_, client) = open(&bus, "client").await;

    let (component, state0) = sample();
    let _publication = host.publish(component.into_ref()).await.unwrap();

    let state = client
        .describe("pub0")
        .sub_component(&["comp0"])
        .endpoint("state0");
    let flags = Arc::new(AtomicUsize::new(0));
    let typed = {
        let flags = flags.clone();
        sink_typed(move |_: bool| {
            flags.fetch_add(1, Ordering::SeqCst);
        })
    };
    let _strict = state.watch(typed).await.unwrap();
    let (sink, mut rx) = ChannelSink::new();
    let _plain = state.watch(sink.into_ref()).await.unwrap();

    state0.update(11).await.unwrap();

    assert_eq!(recv(&mut rx).await.decode::<i64>().unwrap(), 11);
    assert_eq!(flags.load(Ordering::SeqCst), 0);
}

/// Тест проверяет, что сообщения одного топика доходят в порядке
/// публикации, а уже принятые в очередь доставляются и после `close`.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ordered_delivery_drains_on_close() {
    const UPDATES: i64 = 50;

    let bus = MemoryBus::new();
    let (_, host) = open(&bus, "host").await;
    let (_, client) = open(&bus, "client").await;

    let (component, state0) = sample();
    let _publication = host.publish(component.into_ref()).await.unwrap();

    let state = client
        .describe("pub0")
        .sub_component(&["comp0"])
        .endpoint("state0");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let slow = {
        let seen = seen.clone();
        sink_fn(move |msg: Message| {
            tokio::task::block_in_place(|| std::thread::sleep(Duration::from_millis(10)));
            if let Ok(value) = msg.decode::<i64>() {
                seen.lock().push(value);
            }
            BusFuture::ok()
        })
    };
    let slow_watcher = state.watch(slow).await.unwrap();
    let (sink, mut rx) = ChannelSink::new();
    let _fast = state.watch(sink.into_ref()).await.unwrap();

    for i in 0..UPDATES {
        state0.update(i).await.unwrap();
    }
    for i in 0..UPDATES {
        assert_eq!(recv(&mut rx).await.decode::<i64>().unwrap(), i);
    }
    sleep(Duration::from_millis(20)).await;
    assert!((seen.lock().len() as i64) < UPDATES);

    slow_watcher.close().await.unwrap();

    let expected: Vec<i64> = (0..UPDATES).collect();
    assert_eq!(*seen.lock(), expected);
}
