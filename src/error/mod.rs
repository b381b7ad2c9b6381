pub mod hub;

pub use hub::{HubError, HubResult};
pub use topichub_error::{ErrorExt, LogLevel, StatusCode};
