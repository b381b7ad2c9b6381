//! Модель компонентов: компоненты, endpoint-ы, источники и потребители
//! сообщений.

pub mod component;
pub mod endpoint;
pub mod sink;

pub use component::*;
pub use endpoint::*;
pub use sink::*;
