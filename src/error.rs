use std::path::PathBuf;

use http::{Method, StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot open archive {}: {reason:#}", path.display())]
    ArchiveOpen { path: PathBuf, reason: anyhow::Error },

    #[error("Could not find \"{0}\"")]
    NotFound(String),

    #[error("Bad request path: {0}")]
    BadPath(String),

    #[error("Method {0} not allowed")]
    MethodNotAllowed(Method),

    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0:#}")]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP status a request failing with this error is answered with.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::BadPath(_) => StatusCode::BAD_REQUEST,
            Error::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Error::ArchiveOpen { .. } | Error::Bind { .. } | Error::Io(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn bind(addr: impl Into<String>, source: std::io::Error) -> Self {
        Error::Bind {
            addr: addr.into(),
            source,
        }
    }
}
