use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid operation path: {0}")]
    InvalidPath(String),

    #[error("invalid access level: {0}")]
    InvalidAccessLevel(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

/// Coarse classification of an [`Error`], stable for callers that translate
/// failures into protocol responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    Conflict,
    Invalid,
    IoFailure,
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Forbidden => ErrorKind::Unauthorized,
            Error::NotFound => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::InvalidPath(_)
            | Error::InvalidAccessLevel(_)
            | Error::InvalidInput(_)
            | Error::Config(_) => {
                ErrorKind::Invalid
            }
            Error::Database(_) | Error::Git(_) | Error::Io(_) | Error::PasswordHash(_) => {
                ErrorKind::IoFailure
            }
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Error::Conflict(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::Forbidden.kind(), ErrorKind::Unauthorized);
        assert_eq!(Error::NotFound.kind(), ErrorKind::NotFound);
        assert_eq!(Error::conflict("dup").kind(), ErrorKind::Conflict);
        assert_eq!(
            Error::InvalidPath("a/b".to_string()).kind(),
            ErrorKind::Invalid
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(Error::from(io).kind(), ErrorKind::IoFailure);
    }
}
