use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{topic::EndpointKind, HubError, HubResult};

/// Сообщение, проходящее через хаб.
///
/// Локально созданные сообщения несут `value` (ещё не закодированное
/// значение), полученные от транспорта — `payload` (сырые байты). Флаг
/// `state` совпадает с retain-битом шины: state-сообщение описывает текущее
/// значение, не-state — событие или команду.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    component: String,
    endpoint: String,
    kind: Option<EndpointKind>,
    value: Option<Value>,
    payload: Option<Bytes>,
    state: bool,
}

impl Message {
    /// Сообщение из значения с явным флагом состояния.
    pub fn new(
        value: impl Into<Value>,
        state: bool,
    ) -> Self {
        Self {
            component: String::new(),
            endpoint: String::new(),
            kind: None,
            value: Some(value.into()),
            payload: None,
            state,
        }
    }

    /// State-сообщение (публикуется с retain).
    pub fn state(value: impl Into<Value>) -> Self {
        Self::new(value, true)
    }

    /// Событие или команда (без retain).
    pub fn event(value: impl Into<Value>) -> Self {
        Self::new(value, false)
    }

    /// Уже закодированные данные, передаются транспорту как есть.
    pub fn raw(
        payload: impl Into<Bytes>,
        state: bool,
    ) -> Self {
        Self {
            component: String::new(),
            endpoint: String::new(),
            kind: None,
            value: None,
            payload: Some(payload.into()),
            state,
        }
    }

    /// Сообщение, полученное от транспорта по топику endpoint-а.
    pub(crate) fn inbound(
        component: &str,
        endpoint: &str,
        kind: EndpointKind,
        payload: Bytes,
        retained: bool,
    ) -> Self {
        Self {
            component: component.to_string(),
            endpoint: endpoint.to_string(),
            kind: Some(kind),
            value: None,
            payload: Some(payload),
            state: retained,
        }
    }

    /// Путь компонента относительно пространства имён (`pub0/comp0`).
    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Вид endpoint-а; известен только для входящих сообщений.
    pub fn kind(&self) -> Option<EndpointKind> {
        self.kind
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    pub fn is_state(&self) -> bool {
        self.state
    }

    /// Извлекает типизированное значение из любого представления.
    pub fn decode<T: DeserializeOwned>(&self) -> HubResult<T> {
        if let Some(value) = &self.value {
            return serde_json::from_value(value.clone()).map_err(HubError::from);
        }
        match &self.payload {
            Some(payload) => serde_json::from_slice(payload).map_err(HubError::from),
            None => Err(HubError::decode("message carries no value")),
        }
    }

    /// Кодирует сообщение для транспорта: сырые байты без изменений, иначе
    /// JSON значения.
    pub fn encode(&self) -> HubResult<Bytes> {
        if let Some(payload) = &self.payload {
            return Ok(payload.clone());
        }
        match &self.value {
            Some(value) => serde_json::to_vec(value)
                .map(Bytes::from)
                .map_err(|e| HubError::Encode {
                    reason: e.to_string(),
                }),
            None => Ok(Bytes::new()),
        }
    }
}
