//! Error types shared across the simulator

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::engine::Location;

/// A fault raised by the engine while running a program. Terminates the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {}: {message}", .location.line + 1)]
pub struct RuntimeError {
    pub location: Location,
    pub message: String,
}

/// Reported when the engine could not be stopped cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct StopError(pub String);

/// Why the engine refused to encode a string field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StringError {
    #[error("invalid UTF-16 string")]
    InvalidUtf16,
    #[error("invalid character: U+{}", hex_code_point(.0))]
    InvalidChar(u32),
}

fn hex_code_point(c: &u32) -> String {
    if *c <= 0xffff {
        format!("{:04X}", c)
    } else {
        format!("{:06X}", c)
    }
}

/// Validation failure local to one field of the keyboard input dialog.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("not an integer")]
    InvalidInteger,
    #[error("out of range: -32768 ~ 32767")]
    IntegerOutOfRange,
    #[error("not a number")]
    InvalidReal,
    #[error("out of range: -1.7E+38 ~ +1.7E+38")]
    RealOutOfRange,
    #[error(transparent)]
    Encoding(#[from] StringError),
    #[error("string length is {0}, exceeding the limit of 255")]
    StringTooLong(usize),
    #[error("error (column {column}): {message}")]
    Compile { column: usize, message: String },
}

/// An inspector edit the engine refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("no variable named {0}")]
    Unknown(String),
    #[error("type mismatch for {0}")]
    TypeMismatch(String),
    #[error("subscript out of range for {0}")]
    SubscriptOutOfRange(String),
}

/// Why a value typed into the variable inspector was not stored
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InspectorError {
    #[error("variables can only be modified while the program is paused or stopped")]
    Disabled,
    #[error("arrays are modified one element at a time")]
    NotAValue,
    #[error(transparent)]
    Value(#[from] FieldError),
    #[error(transparent)]
    Binding(#[from] BindingError),
}

/// The program script could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {}: {message}", .line + 1)]
pub struct ScriptError {
    pub line: usize,
    pub message: String,
}

impl ScriptError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self { line, message: message.into() }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_char_formatting() {
        assert_eq!(StringError::InvalidChar(0x4e2d).to_string(), "invalid character: U+4E2D");
        assert_eq!(StringError::InvalidChar(0x1f600).to_string(), "invalid character: U+01F600");
    }

    #[test]
    fn test_runtime_error_uses_one_based_line() {
        let err = RuntimeError {
            location: Location { line: 4, start_column: 0, end_column: 3 },
            message: "division by zero".to_string(),
        };
        assert_eq!(err.to_string(), "line 5: division by zero");
    }
}
