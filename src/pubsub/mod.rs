//! Ядро Publish–Subscribe хаба.
//!
//! - `message`: сообщение с флагом состояния и двумя представлениями
//!   значения (JSON или сырые байты).
//! - `future`: единый асинхронный результат операций шины.
//! - `handlers`: мультиплексор подписок (фильтр → обработчики).

pub mod future;
pub mod handlers;
pub mod message;

pub use future::*;
pub use handlers::*;
pub use message::*;
