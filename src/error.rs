use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can abort a population run. There is no recoverable
/// category: the caller is expected to stop at the first `Err`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("nested path '{0}' not supported")]
    NestedPath(String),

    #[error("unknown file type '{0}'")]
    UnknownFileType(String),

    #[error("unknown attribute line '{0}'")]
    UnknownAttribute(String),

    #[error("{0} too long")]
    FieldTooLong(&'static str),

    #[error("invalid permission bits '{0}'")]
    InvalidPermission(String),

    #[error("symlink '{0}' has no target")]
    MissingTarget(String),

    #[error("regular file '{0}' has no source")]
    MissingSource(String),

    #[error("open {}: {source}", path.display())]
    SourceOpen { path: PathBuf, source: io::Error },

    #[error("stat {}: {source}", path.display())]
    SourceStat { path: PathBuf, source: io::Error },

    #[error("read {}: {source}", path.display())]
    SourceRead { path: PathBuf, source: io::Error },

    #[error("{op}: {source}")]
    Backend { op: &'static str, source: io::Error },

    #[error("read manifest: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn backend(op: &'static str) -> impl FnOnce(io::Error) -> Error {
        move |source| Error::Backend { op, source }
    }
}
