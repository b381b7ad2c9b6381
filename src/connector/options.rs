use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Имя параметра запроса с идентификатором клиента.
pub const OPT_CLIENT_ID: &str = "client-id";
/// Имя параметра запроса, включающего дедупликацию обработчиков.
pub const OPT_DEDUP_HANDLERS: &str = "dedup-handlers";

/// Параметры подключения коннектора.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorOptions {
    /// Пространство имён (префикс всех топиков).
    pub namespace: String,
    /// Идентификатор клиента; пустой заменяется случайным UUID v4.
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Вызывать обработчик один раз, даже если совпало несколько его
    /// фильтров.
    pub dedup_handlers: bool,
}

impl ConnectorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(
        mut self,
        namespace: impl Into<String>,
    ) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn client_id(
        mut self,
        client_id: impl Into<String>,
    ) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn dedup_handlers(
        mut self,
        dedup: bool,
    ) -> Self {
        self.dedup_handlers = dedup;
        self
    }

    /// Извлекает параметры из URL подключения.
    ///
    /// Пространство имён берётся из пути, учётные данные — из userinfo,
    /// `client-id` и `dedup-handlers` — из строки запроса (последнее
    /// значение побеждает).
    pub fn from_url(url: &Url) -> Self {
        let mut opts = Self::new().namespace(url.path().trim_matches('/'));
        if !url.username().is_empty() {
            opts.username = Some(url.username().to_string());
        }
        opts.password = url.password().map(str::to_string);
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                OPT_CLIENT_ID => opts.client_id = value.into_owned(),
                OPT_DEDUP_HANDLERS => {
                    opts.dedup_handlers = matches!(value.as_ref(), "1" | "true" | "yes")
                }
                _ => {}
            }
        }
        opts
    }

    /// Гарантирует непустой идентификатор клиента.
    pub fn ensure_client_id(&mut self) -> &str {
        if self.client_id.is_empty() {
            self.client_id = Uuid::new_v4().to_string();
        }
        &self.client_id
    }
}
