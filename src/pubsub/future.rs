use std::{
    future::{Future, IntoFuture},
    pin::Pin,
};

use tokio::sync::oneshot;

use crate::{HubError, HubResult};

/// Результат асинхронной операции шины (subscribe, unsubscribe, publish).
///
/// Либо уже готов (`ready`), либо ждёт подтверждения от транспорта через
/// [`Acknowledger`]. `wait()` идемпотентен: после первого разрешения
/// результат запоминается и повторные вызовы не блокируются.
#[must_use = "bus operations report their outcome through the future"]
#[derive(Debug)]
pub struct BusFuture {
    state: FutureState,
}

#[derive(Debug)]
enum FutureState {
    Ready(HubResult<()>),
    Pending(oneshot::Receiver<HubResult<()>>),
}

/// Сторона транспорта, которая завершает [`BusFuture`].
///
/// Если `Acknowledger` уничтожен без вызова `complete`, ожидающая сторона
/// получит [`HubError::Closed`].
#[derive(Debug)]
pub struct Acknowledger {
    tx: oneshot::Sender<HubResult<()>>,
}

impl Acknowledger {
    pub fn complete(
        self,
        result: HubResult<()>,
    ) {
        // Получатель мог уже уйти — результат в этом случае никому не нужен.
        let _ = self.tx.send(result);
    }
}

impl BusFuture {
    /// Уже разрешённый результат.
    pub fn ready(result: HubResult<()>) -> Self {
        Self {
            state: FutureState::Ready(result),
        }
    }

    pub fn ok() -> Self {
        Self::ready(Ok(()))
    }

    pub fn failed(err: HubError) -> Self {
        Self::ready(Err(err))
    }

    /// Создаёт ожидающий future и парный ему `Acknowledger`.
    pub fn pending() -> (Acknowledger, Self) {
        let (tx, rx) = oneshot::channel();
        (
            Acknowledger { tx },
            Self {
                state: FutureState::Pending(rx),
            },
        )
    }

    /// Ждёт завершения операции и возвращает её результат.
    pub async fn wait(&mut self) -> HubResult<()> {
        if let FutureState::Pending(rx) = &mut self.state {
            let result = rx.await.unwrap_or_else(|err| Err(err.into()));
            self.state = FutureState::Ready(result);
        }
        match &self.state {
            FutureState::Ready(result) => result.clone(),
            FutureState::Pending(_) => unreachable!("resolved above"),
        }
    }

    /// Неблокирующая проверка: `Some`, если результат уже известен.
    pub fn try_result(&mut self) -> Option<HubResult<()>> {
        if let FutureState::Pending(rx) = &mut self.state {
            match rx.try_recv() {
                Ok(result) => self.state = FutureState::Ready(result),
                Err(oneshot::error::TryRecvError::Empty) => return None,
                Err(oneshot::error::TryRecvError::Closed) => {
                    self.state = FutureState::Ready(Err(HubError::Closed))
                }
            }
        }
        match &self.state {
            FutureState::Ready(result) => Some(result.clone()),
            FutureState::Pending(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, FutureState::Ready(_))
    }
}

impl IntoFuture for BusFuture {
    type Output = HubResult<()>;
    type IntoFuture = Pin<Box<dyn Future<Output = HubResult<()>> + Send>>;

    fn into_future(mut self) -> Self::IntoFuture {
        Box::pin(async move { self.wait().await })
    }
}
