use thiserror::Error;
use zip::result::ZipError;

pub type NpyResult<T> = Result<T, NpyError>;

#[derive(Error, Debug)]
pub enum NpyError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Zip(#[source] ZipError),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Shape mismatch: shape holds {expected} elements, buffer holds {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
}

// Stream failures inside the archive surface as plain I/O errors.
impl From<ZipError> for NpyError {
    fn from(err: ZipError) -> Self {
        match err {
            ZipError::Io(e) => NpyError::Io(e),
            other => NpyError::Zip(other),
        }
    }
}
