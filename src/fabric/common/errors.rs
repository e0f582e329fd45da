use std::fmt::{Debug, Display};
use std::net::AddrParseError;
use std::sync::PoisonError;
use std::{fmt, io, result};

#[derive(Debug)]
pub struct Error {
    err: Box<ErrorKind>, // use a Box to keep the Result type smaller
}

#[derive(Debug)]
pub enum ErrorKind {
    StringError(String),
    IOError(io::Error),
    JSONError(serde_json::Error),
    UTF8Error(std::str::Utf8Error),
    AddrParseError(AddrParseError),
    PoisonError,
    ClosedError,
    Truncated,
    OversizedFrame { len: u32, cap: u32 },
    OversizedField { len: usize },
    NoBackend,
    Timeout,
    StorageError(String),
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    pub fn new<S: ToString>(s: S) -> Self {
        Error {
            err: Box::new(ErrorKind::StringError(s.to_string())),
        }
    }

    pub fn closed() -> Self {
        Error {
            err: Box::new(ErrorKind::ClosedError),
        }
    }

    pub fn truncated() -> Self {
        Error {
            err: Box::new(ErrorKind::Truncated),
        }
    }

    pub fn oversized_frame(len: u32, cap: u32) -> Self {
        Error {
            err: Box::new(ErrorKind::OversizedFrame { len, cap }),
        }
    }

    pub fn oversized_field(len: usize) -> Self {
        Error {
            err: Box::new(ErrorKind::OversizedField { len }),
        }
    }

    pub fn no_backend() -> Self {
        Error {
            err: Box::new(ErrorKind::NoBackend),
        }
    }

    /// storage wraps an error from the redb-backed client directory. redb's error
    /// types don't implement a single common trait we can blanket-impl From for,
    /// so callers map_err(Error::storage) at the call site (same approach as
    /// wrapping store errors with .to_string() elsewhere in the ecosystem).
    pub fn storage<E: Display>(e: E) -> Self {
        Error {
            err: Box::new(ErrorKind::StorageError(e.to_string())),
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.err
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Self {
        Error {
            err: Box::new(ErrorKind::StringError(String::from(err))),
        }
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Error {
            err: Box::new(ErrorKind::StringError(err)),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error {
            err: Box::new(ErrorKind::IOError(err)),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            err: Box::new(ErrorKind::JSONError(err)),
        }
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Error {
            err: Box::new(ErrorKind::UTF8Error(err)),
        }
    }
}

impl From<AddrParseError> for Error {
    fn from(err: AddrParseError) -> Self {
        Error {
            err: Box::new(ErrorKind::AddrParseError(err)),
        }
    }
}

impl<Guard> From<PoisonError<Guard>> for Error {
    fn from(_err: PoisonError<Guard>) -> Self {
        Error {
            err: Box::new(ErrorKind::PoisonError),
        }
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_err: tokio::time::error::Elapsed) -> Self {
        Error {
            err: Box::new(ErrorKind::Timeout),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(&self.err, f)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::StringError(s) => f.write_str(s),
            ErrorKind::IOError(e) => Display::fmt(e, f),
            ErrorKind::JSONError(e) => Display::fmt(e, f),
            ErrorKind::UTF8Error(e) => Display::fmt(e, f),
            ErrorKind::AddrParseError(e) => Display::fmt(e, f),
            ErrorKind::PoisonError => f.write_str("another thread panicked while holding the lock"),
            ErrorKind::ClosedError => f.write_str("connection is closed"),
            ErrorKind::Truncated => f.write_str("envelope was truncated"),
            ErrorKind::OversizedFrame { len, cap } => {
                write!(f, "envelope of {len} bytes exceeds the {cap} byte cap")
            }
            ErrorKind::OversizedField { len } => {
                write!(f, "client_id of {len} bytes exceeds the 255 byte field limit")
            }
            ErrorKind::NoBackend => f.write_str("no healthy backend is available"),
            ErrorKind::Timeout => f.write_str("operation timed out"),
            ErrorKind::StorageError(s) => f.write_str(s),
        }
    }
}

impl std::error::Error for Error {}
