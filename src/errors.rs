use std::path::PathBuf;
use thiserror::Error;

use crate::commands::Step;

/// Structured error types for card conversion.
///
/// Each variant carries the context of its failure domain (configuration,
/// filesystem, external tools) so a failed job can be reported without
/// parsing error strings.
#[derive(Error, Debug)]
pub enum CardConvertError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{step} failed: `{command}` exited with {code:?}\nSTDOUT:{stdout}\nSTDERR:{stderr}")]
    Command {
        step: Step,
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Failed to start `{program}`")]
    ToolSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Validation error: {field} {reason}")]
    Validation { field: String, reason: String },

    #[error("Worker pool error: could not build thread pool")]
    WorkerPool {
        #[source]
        source: rayon::ThreadPoolBuildError,
    },
}

pub type Result<T> = std::result::Result<T, CardConvertError>;

impl CardConvertError {
    pub(crate) fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }
}

/// Convert I/O errors that arrive without path context.
///
/// Code that knows the path should build `CardConvertError::FileSystem`
/// directly.
impl From<std::io::Error> for CardConvertError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for CardConvertError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::WorkerPool { source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_display() {
        let err = CardConvertError::Command {
            step: Step::MediumCopy,
            command: "convert a.png b.png".to_string(),
            code: Some(1),
            stdout: String::new(),
            stderr: "no such file".to_string(),
        };

        let message = err.to_string();
        assert!(message.starts_with("medium copy failed"));
        assert!(message.contains("`convert a.png b.png`"));
        assert!(message.contains("STDERR:no such file"));
    }

    #[test]
    fn test_io_error_conversion() {
        let err: CardConvertError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(err, CardConvertError::FileSystem { .. }));
    }
}
