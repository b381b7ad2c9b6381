/// Разделитель уровней топика.
pub const SEPARATOR: char = '/';
/// Маркер сегмента точки данных (state).
pub const DATA_MARKER: &str = ":";
/// Маркер сегмента актуатора (команды).
pub const ACTOR_MARKER: &str = "!";

/// Вид endpoint-а, закодированный маркером в топике.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    /// `<path>/:/<name>` — исходящие значения точки данных.
    DataPoint,
    /// `<path>/!/<name>` — входящие команды реактору.
    Actuator,
}

impl EndpointKind {
    pub fn marker(self) -> &'static str {
        match self {
            Self::DataPoint => DATA_MARKER,
            Self::Actuator => ACTOR_MARKER,
        }
    }

    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            DATA_MARKER => Some(Self::DataPoint),
            ACTOR_MARKER => Some(Self::Actuator),
            _ => None,
        }
    }
}

/// Адрес endpoint-а, извлечённый из топика.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicAddress<'a> {
    pub component: &'a str,
    pub endpoint: &'a str,
    pub kind: EndpointKind,
}

/// Нормализует пространство имён: обрезает `/` по краям и добавляет
/// завершающий `/`, если namespace не пуст.
pub fn normalize_namespace(namespace: &str) -> String {
    let trimmed = namespace.trim_matches(SEPARATOR);
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}{SEPARATOR}")
    }
}

/// Склеивает два сегмента пути через `/`, не допуская двойных разделителей.
pub fn join(
    base: &str,
    segment: &str,
) -> String {
    let base = base.trim_end_matches(SEPARATOR);
    let segment = segment.trim_start_matches(SEPARATOR);
    match (base.is_empty(), segment.is_empty()) {
        (true, _) => segment.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}{SEPARATOR}{segment}"),
    }
}

/// Топик точки данных: `<base>/:/<name>`.
pub fn data_topic(
    base: &str,
    name: &str,
) -> String {
    endpoint_topic(base, name, EndpointKind::DataPoint)
}

/// Топик актуатора: `<base>/!/<name>`.
pub fn actor_topic(
    base: &str,
    name: &str,
) -> String {
    endpoint_topic(base, name, EndpointKind::Actuator)
}

pub fn endpoint_topic(
    base: &str,
    name: &str,
    kind: EndpointKind,
) -> String {
    join(&join(base, kind.marker()), name)
}

/// Путь вложенного компонента: `<base>/<id1>/<id2>/...`.
pub fn sub_component_topic<S: AsRef<str>>(
    base: &str,
    ids: &[S],
) -> String {
    ids.iter()
        .fold(base.to_string(), |acc, id| join(&acc, id.as_ref()))
}

/// Разбирает топик без префикса пространства имён.
///
/// Принимает только форму `<component>/<marker>/<endpoint>`, где
/// `<component>` не пуст, `<marker>` — `:` или `!`, а `<endpoint>` — один
/// непустой уровень. Всё остальное не является топиком endpoint-а.
pub fn parse_topic(relative: &str) -> Option<TopicAddress<'_>> {
    let (rest, endpoint) = relative.rsplit_once(SEPARATOR)?;
    if endpoint.is_empty() {
        return None;
    }
    let (component, marker) = rest.rsplit_once(SEPARATOR)?;
    let kind = EndpointKind::from_marker(marker)?;
    if component.is_empty() {
        return None;
    }
    Some(TopicAddress {
        component,
        endpoint,
        kind,
    })
}

/// Разбирает полный топик, предварительно отрезая префикс пространства имён.
pub fn parse_topic_with_prefix<'a>(
    topic: &'a str,
    prefix: &str,
) -> Option<TopicAddress<'a>> {
    parse_topic(topic.strip_prefix(prefix)?)
}
