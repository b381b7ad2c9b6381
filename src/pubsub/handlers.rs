use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::trace;

use super::Message;
use crate::{
    topic::{tokenize, TopicFilter},
    HubError, HubResult,
};

type HandlerFn = dyn Fn(&str, &Message) + Send + Sync;

/// Ссылка на обработчик входящих сообщений: `(topic, message)`.
///
/// Идентичность определяется указателем: два клона одной ссылки — один и
/// тот же обработчик для `add`/`remove`.
#[derive(Clone)]
pub struct HandlerRef {
    inner: Arc<HandlerFn>,
}

impl HandlerRef {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &Message) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(handler),
        }
    }

    #[inline]
    pub fn call(
        &self,
        topic: &str,
        msg: &Message,
    ) {
        (self.inner)(topic, msg)
    }

    #[inline]
    pub fn ptr_eq(
        &self,
        other: &HandlerRef,
    ) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "HandlerRef({:p})", Arc::as_ptr(&self.inner))
    }
}

/// Состояние физической подписки группы.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupState {
    /// SUBSCRIBE отправлен, подтверждения ещё нет.
    Pending,
    Ready,
    Failed(HubError),
}

/// Группа подписки: разобранный фильтр, обработчики в порядке регистрации
/// и состояние подписки на транспорте.
struct HandlerGroup {
    filter: TopicFilter,
    handlers: Vec<HandlerRef>,
    state: watch::Sender<GroupState>,
}

/// Итог регистрации обработчика.
#[derive(Debug, Default)]
pub struct Registration {
    /// Фильтры созданных групп: для них нужен SUBSCRIBE.
    pub subs: Vec<String>,
    /// Чужие группы, чья подписка ещё не подтверждена.
    pub pending: Vec<PendingGroup>,
}

/// Ожидание подтверждения подписки группы, созданной другим вызовом.
#[derive(Debug)]
pub struct PendingGroup {
    filter: String,
    state: watch::Receiver<GroupState>,
}

impl PendingGroup {
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Ждёт, пока группа выйдет из состояния `Pending`.
    ///
    /// Группа, удалённая без подтверждения, считается закрытой.
    pub async fn ready(&mut self) -> HubResult<()> {
        let failure = match self.state.wait_for(|s| *s != GroupState::Pending).await {
            Ok(state) => match &*state {
                GroupState::Failed(err) => Some(err.clone()),
                _ => None,
            },
            Err(_) => Some(HubError::Closed),
        };
        failure.map_or(Ok(()), Err)
    }
}

/// Мультиплексор подписок: фильтр → список обработчиков.
///
/// Множество логических подписчиков одного фильтра разделяют одну
/// физическую подписку транспорта. `add` возвращает фильтры, на которые
/// нужно выполнить SUBSCRIBE, `remove` — фильтры для UNSUBSCRIBE.
///
/// Новая группа живёт в состоянии `Pending`, пока создавший её вызов не
/// сообщит итог через `mark_ready` или `fail`. Остальные обработчики этой
/// группы ждут итога через [`PendingGroup`].
///
/// Все операции потокобезопасны: `dispatch` берёт разделяемую блокировку,
/// `add`/`remove` — эксклюзивную. Обработчики вызываются вне блокировки.
pub struct TopicHandlerMap {
    groups: RwLock<HashMap<String, HandlerGroup>>,
    dedup: bool,
}

impl Default for TopicHandlerMap {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicHandlerMap {
    pub fn new() -> Self {
        Self::with_dedup(false)
    }

    /// При `dedup = true` обработчик, зарегистрированный под несколькими
    /// совпавшими фильтрами, получает сообщение один раз.
    pub fn with_dedup(dedup: bool) -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
            dedup,
        }
    }

    /// Регистрирует обработчик под каждым фильтром.
    ///
    /// В `subs` попадают фильтры, для которых группа создана впервые, в
    /// `pending` группы, ещё ожидающие чужого SUBSCRIBE.
    pub fn add<S: AsRef<str>>(
        &self,
        filters: &[S],
        handler: &HandlerRef,
    ) -> Registration {
        let mut registration = Registration::default();
        let mut groups = self.groups.write();
        for filter in filters {
            let filter = filter.as_ref();
            match groups.get_mut(filter) {
                Some(group) => {
                    if *group.state.borrow() == GroupState::Pending
                        && !registration.subs.iter().any(|f| f == filter)
                    {
                        registration.pending.push(PendingGroup {
                            filter: filter.to_string(),
                            state: group.state.subscribe(),
                        });
                    }
                    group.handlers.push(handler.clone());
                }
                None => {
                    registration.subs.push(filter.to_string());
                    let (state, _) = watch::channel(GroupState::Pending);
                    groups.insert(
                        filter.to_string(),
                        HandlerGroup {
                            filter: TopicFilter::parse(filter),
                            handlers: vec![handler.clone()],
                            state,
                        },
                    );
                }
            }
        }
        registration
    }

    /// Отмечает подписку групп как подтверждённую.
    pub fn mark_ready<S: AsRef<str>>(
        &self,
        filters: &[S],
    ) {
        let groups = self.groups.read();
        for filter in filters {
            if let Some(group) = groups.get(filter.as_ref()) {
                group.state.send_replace(GroupState::Ready);
            }
        }
    }

    /// Удаляет ожидающие группы целиком и передаёт ошибку всем их
    /// обработчикам.
    ///
    /// Группы, уже подтверждённые, не трогаются.
    pub fn fail<S: AsRef<str>>(
        &self,
        filters: &[S],
        err: &HubError,
    ) {
        let mut groups = self.groups.write();
        for filter in filters {
            let filter = filter.as_ref();
            let pending = groups
                .get(filter)
                .is_some_and(|g| *g.state.borrow() == GroupState::Pending);
            if !pending {
                continue;
            }
            if let Some(group) = groups.remove(filter) {
                trace!(filter, handlers = group.handlers.len(), "dropping failed group");
                group.state.send_replace(GroupState::Failed(err.clone()));
            }
        }
    }

    /// Снимает обработчик с каждого фильтра.
    ///
    /// Возвращает фильтры, группы которых опустели и были удалены.
    pub fn remove<S: AsRef<str>>(
        &self,
        filters: &[S],
        handler: &HandlerRef,
    ) -> Vec<String> {
        let mut unsubs = Vec::new();
        let mut groups = self.groups.write();
        for filter in filters {
            let filter = filter.as_ref();
            let Some(group) = groups.get_mut(filter) else {
                continue;
            };
            if let Some(pos) = group.handlers.iter().position(|h| h.ptr_eq(handler)) {
                group.handlers.remove(pos);
                if group.handlers.is_empty() {
                    groups.remove(filter);
                    unsubs.push(filter.to_string());
                }
            }
        }
        unsubs
    }

    /// Доставляет сообщение всем обработчикам всех совпавших групп.
    ///
    /// Возвращает число вызовов обработчиков.
    pub fn dispatch(
        &self,
        topic: &str,
        msg: &Message,
    ) -> usize {
        let tokens = tokenize(topic);
        let mut targets: Vec<HandlerRef> = Vec::new();
        {
            let groups = self.groups.read();
            for group in groups.values() {
                if group.filter.matches_tokens(&tokens) {
                    targets.extend(group.handlers.iter().cloned());
                }
            }
        }

        if self.dedup {
            let mut unique: Vec<HandlerRef> = Vec::with_capacity(targets.len());
            for h in targets {
                if !unique.iter().any(|u| u.ptr_eq(&h)) {
                    unique.push(h);
                }
            }
            targets = unique;
        }

        trace!(topic, handlers = targets.len(), "dispatching message");
        for handler in &targets {
            handler.call(topic, msg);
        }
        targets.len()
    }

    /// Количество активных групп (физических подписок).
    pub fn group_count(&self) -> usize {
        self.groups.read().len()
    }

    /// Состояние подписки группы фильтра.
    pub fn state(
        &self,
        filter: &str,
    ) -> Option<GroupState> {
        self.groups
            .read()
            .get(filter)
            .map(|g| g.state.borrow().clone())
    }

    /// Количество обработчиков в группе фильтра.
    pub fn handler_count(
        &self,
        filter: &str,
    ) -> usize {
        self.groups
            .read()
            .get(filter)
            .map_or(0, |g| g.handlers.len())
    }

    pub fn contains(
        &self,
        filter: &str,
    ) -> bool {
        self.groups.read().contains_key(filter)
    }

    /// Список зарегистрированных фильтров.
    pub fn filters(&self) -> Vec<String> {
        self.groups.read().keys().cloned().collect()
    }
}
