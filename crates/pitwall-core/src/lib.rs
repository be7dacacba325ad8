pub mod errors;
pub mod payload;

pub use errors::RelayError;
pub use payload::{expand, parse_body};
