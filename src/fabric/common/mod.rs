mod errors;

pub use errors::{Error, ErrorKind, Result};
