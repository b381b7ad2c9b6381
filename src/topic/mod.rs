//! Адресация топиков.
//!
//! - `codec`: преобразование (путь компонента, endpoint, вид) ⇄ топик.
//! - `filter`: разбор фильтров с `+`/`#` и сопоставление с топиками.

pub mod codec;
pub mod filter;

pub use codec::*;
pub use filter::*;
