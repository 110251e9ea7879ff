//! Error type shared by every stage of a query run.
//!
//! None of these are retryable: any error aborts the current evaluation.

use std::io;
use std::path::PathBuf;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input that is not a well-formed tag nesting
    #[error(
        "malformed input{}: {message}",
        .position.map(|p| format!(" at byte {p}")).unwrap_or_default()
    )]
    Malformed {
        message: String,
        position: Option<usize>,
    },

    /// The token source could not be opened
    #[error("cannot open input {}: {source}", .path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Read failure after the source was opened
    #[error("i/o error while reading input: {0}")]
    Io(#[from] io::Error),

    /// Path expression text that cannot be parsed
    #[error("invalid path expression at offset {position}: {message}")]
    PathSyntax { message: String, position: usize },

    /// Matcher reached a state that signals a logic defect
    #[error("internal matcher error: {message}\n{dump}")]
    Internal { message: String, dump: String },
}

impl Error {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Error::Malformed {
            message: message.into(),
            position: None,
        }
    }

    pub(crate) fn malformed_at(message: impl Into<String>, position: usize) -> Self {
        Error::Malformed {
            message: message.into(),
            position: Some(position),
        }
    }

    pub(crate) fn path_syntax(message: impl Into<String>, position: usize) -> Self {
        Error::PathSyntax {
            message: message.into(),
            position,
        }
    }

    pub(crate) fn internal(message: impl Into<String>, dump: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
            dump: dump.into(),
        }
    }

    /// Attach a byte position to a malformed-input error that has none yet
    pub(crate) fn with_position(self, position: usize) -> Self {
        match self {
            Error::Malformed {
                message,
                position: None,
            } => Error::Malformed {
                message,
                position: Some(position),
            },
            other => other,
        }
    }

    /// True for errors caused by the input document rather than by the engine
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Error::Malformed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display_with_position() {
        let err = Error::malformed_at("close tag without open tag", 17);
        assert_eq!(
            err.to_string(),
            "malformed input at byte 17: close tag without open tag"
        );
    }

    #[test]
    fn test_malformed_display_without_position() {
        let err = Error::malformed("premature end of input");
        assert_eq!(err.to_string(), "malformed input: premature end of input");
    }

    #[test]
    fn test_with_position_keeps_existing() {
        let err = Error::malformed_at("x", 3).with_position(9);
        assert!(matches!(err, Error::Malformed { position: Some(3), .. }));

        let err = Error::malformed("x").with_position(9);
        assert!(matches!(err, Error::Malformed { position: Some(9), .. }));
        assert!(err.is_malformed_input());
    }
}
