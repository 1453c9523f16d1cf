use crate::*;

use std::io;
use thiserror::Error;

/// Everything that can go wrong in the core.
///
/// Detection never fails just because nothing matched; an empty result is
/// success.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed construction input: a missing or forbidden parent, mutually
    /// exclusive options both set, an unsupported mode, a bad key size...
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Something with this key is already registered.
    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),
    /// Nothing with this key is registered.
    #[error("not found: {0}")]
    NotFound(String),
    /// An external collaborator failed to open or read a stream.
    #[error("back end failure{}: {source}", describe(.path_spec))]
    Backend {
        path_spec: Option<Box<PathSpec>>,
        #[source]
        source: io::Error,
    },
    /// Enumerating an entry was refused. The searcher recovers from this by
    /// pruning the subtree.
    #[error("access denied: {0}")]
    AccessDenied(String),
}

pub type Result<T> = std::result::Result<T, Error>;

fn describe(path_spec: &Option<Box<PathSpec>>) -> String {
    match path_spec {
        None => String::new(),
        Some(path_spec) => format!(" on {}", path_spec.short_name()),
    }
}

impl Error {
    pub fn backend(path_spec: &PathSpec, source: io::Error) -> Error {
        Error::Backend {
            path_spec: Some(Box::new(path_spec.clone())),
            source,
        }
    }
    pub fn is_access_denied(&self) -> bool {
        match self {
            Error::AccessDenied(..) => true,
            Error::Backend { source, .. }
                => source.kind() == io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        if err.kind() == io::ErrorKind::PermissionDenied {
            Error::AccessDenied(err.to_string())
        }
        else {
            Error::Backend { path_spec: None, source: err }
        }
    }
}
