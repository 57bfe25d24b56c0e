//! Error types for the ecmabc compiler backend

use std::fmt;
use thiserror::Error;

/// Source location of an AST node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct SourceLocation {
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed)
    pub column: u32,
    /// Byte offset in source
    #[serde(default)]
    pub offset: usize,
}

impl SourceLocation {
    /// Create a location from a line and column
    pub fn new(line: u32, column: u32) -> Self {
        Self {
            line,
            column,
            offset: 0,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Stable category tag for an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// A syntactic form the emitters do not cover
    UnsupportedConstruct,
    /// `yield`, `await`, `super` or a private name used where the enclosing function forbids it
    InvalidContext,
    /// A byte in a bytecode stream that is not a known opcode
    UnknownOpcode,
    /// A jump references a label that was never bound
    UnresolvedLabel,
    /// Failure while encoding or decoding the binary object format
    Serialization,
    /// I/O or input decoding failure
    Io,
    /// Broken internal invariant
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::UnsupportedConstruct => "UnsupportedConstruct",
            ErrorCategory::InvalidContext => "InvalidContext",
            ErrorCategory::UnknownOpcode => "UnknownOpcode",
            ErrorCategory::UnresolvedLabel => "UnresolvedLabel",
            ErrorCategory::Serialization => "Serialization",
            ErrorCategory::Io => "Io",
            ErrorCategory::Internal => "Internal",
        };
        f.write_str(name)
    }
}

/// Main error type for ecmabc
#[derive(Error, Debug)]
pub enum Error {
    /// The emitter subset does not cover this construct
    #[error("UnsupportedConstruct: {construct} at {location}")]
    UnsupportedConstruct {
        construct: String,
        location: SourceLocation,
    },

    /// Construct used in a context that forbids it
    #[error("InvalidContext: {construct} at {location}")]
    InvalidContext {
        construct: String,
        location: SourceLocation,
    },

    /// Decoding hit a byte that is not an opcode for the current phase
    #[error("UnknownOpcode: 0x{byte:02x} at offset {offset}")]
    UnknownOpcode { byte: u8, offset: usize },

    /// A jump references a label that was never bound
    #[error("UnresolvedLabel: label {label} is referenced but never bound")]
    UnresolvedLabel { label: u32 },

    /// The in-memory model cannot be written in the object format
    #[error("SerializeError: {0}")]
    Serialize(String),

    /// Malformed input to the object reader
    #[error("DeserializeError: {message} at offset {offset}")]
    Deserialize { message: String, offset: usize },

    /// IO error
    #[error("IOError: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON AST input could not be decoded
    #[error("JsonError: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// Internal compiler error
    #[error("InternalError: {0}")]
    Internal(String),
}

impl Error {
    /// Create an unsupported construct error
    pub fn unsupported(construct: impl Into<String>, location: SourceLocation) -> Self {
        Error::UnsupportedConstruct {
            construct: construct.into(),
            location,
        }
    }

    /// Create an invalid context error
    pub fn invalid_context(construct: impl Into<String>, location: SourceLocation) -> Self {
        Error::InvalidContext {
            construct: construct.into(),
            location,
        }
    }

    /// Create an unknown opcode error
    pub fn unknown_opcode(byte: u8, offset: usize) -> Self {
        Error::UnknownOpcode { byte, offset }
    }

    /// Create a deserialization error
    pub fn deserialize(message: impl Into<String>, offset: usize) -> Self {
        Error::Deserialize {
            message: message.into(),
            offset,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }

    /// The taxonomy bucket this error belongs to
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnsupportedConstruct { .. } => ErrorCategory::UnsupportedConstruct,
            Error::InvalidContext { .. } => ErrorCategory::InvalidContext,
            Error::UnknownOpcode { .. } => ErrorCategory::UnknownOpcode,
            Error::UnresolvedLabel { .. } => ErrorCategory::UnresolvedLabel,
            Error::Serialize(_) | Error::Deserialize { .. } => ErrorCategory::Serialization,
            Error::Io { .. } | Error::Json { .. } => ErrorCategory::Io,
            Error::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Source position attached to the error, if any
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            Error::UnsupportedConstruct { location, .. } | Error::InvalidContext { location, .. } => {
                Some(*location)
            }
            _ => None,
        }
    }
}

/// Result type alias for ecmabc
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        let loc = SourceLocation::new(3, 7);
        assert_eq!(
            Error::unsupported("with", loc).category(),
            ErrorCategory::UnsupportedConstruct
        );
        assert_eq!(
            Error::invalid_context("yield", loc).category(),
            ErrorCategory::InvalidContext
        );
        assert_eq!(Error::unknown_opcode(0xff, 4).category(), ErrorCategory::UnknownOpcode);
        assert_eq!(
            Error::UnresolvedLabel { label: 2 }.category(),
            ErrorCategory::UnresolvedLabel
        );
        assert_eq!(Error::deserialize("eof", 0).category(), ErrorCategory::Serialization);
    }

    #[test]
    fn test_display_includes_location() {
        let err = Error::invalid_context("await outside async function", SourceLocation::new(2, 5));
        assert_eq!(err.to_string(), "InvalidContext: await outside async function at 2:5");
        assert_eq!(err.location(), Some(SourceLocation::new(2, 5)));
    }

    #[test]
    fn test_unknown_opcode_display() {
        let err = Error::unknown_opcode(0xfe, 12);
        assert_eq!(err.to_string(), "UnknownOpcode: 0xfe at offset 12");
        assert_eq!(err.location(), None);
    }
}
