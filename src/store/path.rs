use crate::error::{Error, Result};

const MAX_PATH_LEN: usize = 255;

/// Checks that an operation path can name a directory directly below the
/// data directory.
pub fn validate_operation_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::InvalidPath(
            "Operation path cannot be empty".to_string(),
        ));
    }

    if path.contains(['/', '\\', ' ']) {
        tracing::debug!(path, "suspicious operation path rejected");
        return Err(Error::InvalidPath(format!(
            "Operation path cannot contain separators or spaces: {path}"
        )));
    }

    if path == "." || path == ".." {
        tracing::debug!(path, "suspicious operation path rejected");
        return Err(Error::InvalidPath(format!(
            "Operation path cannot be a relative directory: {path}"
        )));
    }

    if path.len() > MAX_PATH_LEN {
        return Err(Error::InvalidPath(format!(
            "Operation path cannot exceed {MAX_PATH_LEN} characters"
        )));
    }

    if path.chars().any(char::is_control) {
        return Err(Error::InvalidPath(
            "Operation path contains invalid characters".to_string(),
        ));
    }

    Ok(())
}
