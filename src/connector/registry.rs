use std::{collections::BTreeMap, fmt, sync::Arc};

use parking_lot::RwLock;
use tracing::debug;
use url::Url;

use super::{Connector, ConnectorOptions};
use crate::{
    transport::{MemoryBus, TransportRef},
    HubError, HubResult,
};

/// Префикс схемы URL хаба: `topichub+<transport>[+<sub>]://...`.
pub const HUB_PROTOCOL: &str = "topichub";
/// Протокол встроенной шины в памяти.
pub const MEMORY_PROTOCOL: &str = "memory";

/// Конструктор транспорта для протокола.
///
/// Получает разобранный URL и итоговые параметры (с уже заполненным
/// `client_id`).
pub type TransportFactory =
    Arc<dyn Fn(&Url, &ConnectorOptions) -> HubResult<TransportRef> + Send + Sync>;

/// Реестр транспортов: схема URL → конструктор.
///
/// Заполняется кодом запуска приложения; глобального состояния нет.
#[derive(Default)]
pub struct ConnectorRegistry {
    factories: RwLock<BTreeMap<String, TransportFactory>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Регистрирует конструктор. Повторная регистрация заменяет прежний.
    pub fn register(
        &self,
        protocol: impl Into<String>,
        factory: TransportFactory,
    ) {
        let protocol = protocol.into();
        debug!(%protocol, "transport registered");
        self.factories.write().insert(protocol, factory);
    }

    pub fn protocols(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }

    /// Разбирает URL и создаёт (неподключённый) коннектор.
    pub fn connect(
        &self,
        url: &str,
    ) -> HubResult<Connector> {
        let parsed = parse_url(url)?;
        let options = ConnectorOptions::from_url(&parsed);
        self.open(&parsed, options)
    }

    /// Создаёт коннектор с явно заданными параметрами.
    pub fn open(
        &self,
        url: &Url,
        mut options: ConnectorOptions,
    ) -> HubResult<Connector> {
        let protocol = protocol_of(url.scheme());
        let factory = self
            .factories
            .read()
            .get(protocol)
            .cloned()
            .ok_or_else(|| HubError::UnknownProtocol {
                protocol: protocol.to_string(),
            })?;
        options.ensure_client_id();
        let transport = factory(url, &options)?;
        debug!(
            %protocol,
            namespace = %options.namespace,
            client_id = %options.client_id,
            "connector created"
        );
        Ok(Connector::new(transport, options))
    }
}

impl fmt::Debug for ConnectorRegistry {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("protocols", &self.protocols())
            .finish()
    }
}

impl MemoryBus {
    /// Конструктор транспорта, подключающий клиентов к этой шине.
    pub fn factory(&self) -> TransportFactory {
        let bus = self.clone();
        Arc::new(move |_url: &Url, options: &ConnectorOptions| {
            let transport: TransportRef = Arc::new(bus.transport(options.client_id.clone()));
            Ok(transport)
        })
    }
}

fn parse_url(url: &str) -> HubResult<Url> {
    Url::parse(url).map_err(|e| HubError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Выделяет протокол транспорта из схемы: префикс хаба отбрасывается,
/// берётся первый сегмент до `+`.
fn protocol_of(scheme: &str) -> &str {
    let scheme = scheme
        .strip_prefix(HUB_PROTOCOL)
        .and_then(|rest| rest.strip_prefix('+'))
        .unwrap_or(scheme);
    scheme.split('+').next().unwrap_or(scheme)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("topichub+memory", "memory")]
    #[case("topichub+mqtt+tcp", "mqtt")]
    #[case("mqtt+ssl", "mqtt")]
    #[case("memory", "memory")]
    #[case("topichub", "topichub")]
    fn test_protocol_of(
        #[case] scheme: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(protocol_of(scheme), expected);
    }

    #[test]
    fn test_unknown_protocol() {
        let registry = ConnectorRegistry::new();
        let err = registry.connect("topichub+nats://host/ns").unwrap_err();
        assert_eq!(
            err,
            HubError::UnknownProtocol {
                protocol: "nats".into()
            }
        );
    }

    #[test]
    fn test_invalid_url() {
        let registry = ConnectorRegistry::new();
        assert!(matches!(
            registry.connect("not a url"),
            Err(HubError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_memory_factory() {
        let bus = MemoryBus::new();
        let registry = ConnectorRegistry::new();
        registry.register(MEMORY_PROTOCOL, bus.factory());
        assert_eq!(registry.protocols(), vec!["memory".to_string()]);

        let conn = registry
            .connect("topichub+memory://local/home/?client-id=dev-1")
            .unwrap();
        assert_eq!(conn.namespace(), "home");
        assert_eq!(conn.client_id(), "dev-1");

        let anon = registry.connect("memory://local/").unwrap();
        assert_eq!(anon.namespace(), "");
        assert!(!anon.client_id().is_empty());
    }
}
