use std::{
    fmt,
    sync::{Arc, Weak},
};

use super::{publish_weak, Connector, ConnectorShared, WatchScope, Watcher};
use crate::{
    hub::{MessageSink, SinkRef},
    topic::{actor_topic, data_topic, join, sub_component_topic, TopicFilter, MULTI_LEVEL_WILDCARD},
    BusFuture, HubError, HubResult, Message,
};

/// Удалённый адрес опубликованного компонента.
///
/// Значение без побочных эффектов: создание и сужение описателя не
/// обращаются к транспорту.
#[derive(Clone)]
pub struct Descriptor {
    conn: Connector,
    id: String,
    topic: String,
}

impl Descriptor {
    pub(crate) fn new(
        conn: Connector,
        id: impl Into<String>,
        topic: String,
    ) -> Self {
        Self {
            conn,
            id: id.into(),
            topic,
        }
    }

    /// Идентификатор компонента (последний сегмент пути).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Полный топик компонента, включая пространство имён.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Сужает описатель до вложенного компонента.
    ///
    /// Без идентификаторов возвращает равный описатель.
    pub fn sub_component<S: AsRef<str>>(
        &self,
        ids: &[S],
    ) -> Descriptor {
        let Some(last) = ids.last() else {
            return self.clone();
        };
        Descriptor {
            conn: self.conn.clone(),
            id: last.as_ref().to_string(),
            topic: sub_component_topic(&self.topic, ids),
        }
    }

    /// Ссылка на один endpoint компонента.
    pub fn endpoint(
        &self,
        name: &str,
    ) -> EndpointRef {
        EndpointRef {
            conn: self.conn.clone(),
            base: self.topic.clone(),
            names: vec![name.to_string()],
        }
    }

    /// Ссылка на несколько endpoint-ов по подпути.
    ///
    /// `sub_path` может содержать `+`, тогда наблюдение охватывает все
    /// подходящие компоненты.
    pub fn endpoints_at<S: AsRef<str>>(
        &self,
        sub_path: &str,
        names: &[S],
    ) -> EndpointRef {
        EndpointRef {
            conn: self.conn.clone(),
            base: join(&self.topic, sub_path),
            names: names.iter().map(|n| n.as_ref().to_string()).collect(),
        }
    }

    /// Наблюдение за всеми точками данных компонента и его потомков.
    pub async fn watch(
        &self,
        sink: SinkRef,
    ) -> HubResult<Watcher> {
        let filter = join(&self.topic, MULTI_LEVEL_WILDCARD);
        Watcher::start(self.conn.clone(), vec![filter], WatchScope::DataPoints, sink).await
    }
}

impl PartialEq for Descriptor {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        Arc::ptr_eq(self.conn.shared(), other.conn.shared())
            && self.id == other.id
            && self.topic == other.topic
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish()
    }
}

/// Ссылка на endpoint(ы) удалённого компонента.
#[derive(Clone)]
pub struct EndpointRef {
    conn: Connector,
    base: String,
    names: Vec<String>,
}

impl EndpointRef {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Топики точек данных, которые покрывает ссылка.
    pub fn data_topics(&self) -> Vec<String> {
        self.names.iter().map(|n| data_topic(&self.base, n)).collect()
    }

    /// Топики актуаторов, которые покрывает ссылка.
    pub fn actor_topics(&self) -> Vec<String> {
        self.names.iter().map(|n| actor_topic(&self.base, n)).collect()
    }

    /// Начинает наблюдение за точками данных.
    ///
    /// Возвращается после подтверждения подписки. При ошибке подписки
    /// обработчик не остаётся зарегистрированным. Ссылка без имён
    /// endpoint-ов даёт [`HubError::Usage`].
    pub async fn watch(
        &self,
        sink: SinkRef,
    ) -> HubResult<Watcher> {
        if self.names.is_empty() {
            return Err(HubError::usage("watch requires at least one endpoint"));
        }
        Watcher::start(
            self.conn.clone(),
            self.data_topics(),
            WatchScope::AllEndpoints,
            sink,
        )
        .await
    }

    /// Потребитель, отправляющий команды реактору.
    ///
    /// Ссылка должна указывать ровно на один конкретный endpoint, иначе
    /// возвращается [`HubError::Usage`].
    pub fn reactor(&self) -> HubResult<SinkRef> {
        let [name] = self.names.as_slice() else {
            return Err(HubError::usage(format!(
                "reactor requires exactly one endpoint, got {}",
                self.names.len()
            )));
        };
        let topic = actor_topic(&self.base, name);
        if TopicFilter::parse(&topic).has_wildcards() {
            return Err(HubError::usage(format!(
                "reactor topic '{topic}' contains wildcards"
            )));
        }
        Ok(Arc::new(ReactorSink {
            conn: Arc::downgrade(self.conn.shared()),
            topic,
        }))
    }
}

/// Команды, отправленные напрямую в ссылку, уходят в топик актуатора.
impl MessageSink for EndpointRef {
    fn consume_message(
        &self,
        msg: Message,
    ) -> BusFuture {
        match self.reactor() {
            Ok(sink) => sink.consume_message(msg),
            Err(err) => BusFuture::failed(err),
        }
    }
}

impl fmt::Debug for EndpointRef {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("EndpointRef")
            .field("base", &self.base)
            .field("names", &self.names)
            .finish()
    }
}

/// Публикует команды в топик актуатора без retain.
struct ReactorSink {
    conn: Weak<ConnectorShared>,
    topic: String,
}

impl MessageSink for ReactorSink {
    fn consume_message(
        &self,
        msg: Message,
    ) -> BusFuture {
        publish_weak(&self.conn, &self.topic, &msg, false)
    }
}
