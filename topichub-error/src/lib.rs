pub mod ext;
pub mod status_code;

// Publicly re-export the error extension trait and status codes to simplify
// access from external code.
pub use ext::*;
pub use status_code::*;
