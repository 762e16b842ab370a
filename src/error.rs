//! Error types for cliconf.
//!
//! Expected structural mismatches between a grammar and device text are not
//! errors: an unmatched line simply contributes no facts, and an entry that
//! cannot be synthesized aborts only its own command. The variants here cover
//! unreadable inputs and malformed requests.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cliconf operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for cliconf.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Grammar Errors
    // ========================================================================
    /// Error parsing a grammar file.
    #[error("Failed to parse grammar '{path}': {message}")]
    GrammarParse {
        /// Path to the grammar file
        path: PathBuf,
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error validating grammar structure.
    #[error("Grammar validation failed: {0}")]
    GrammarValidation(String),

    /// Mode not found.
    #[error("Mode '{0}' not found in grammar")]
    ModeNotFound(String),

    // ========================================================================
    // Request Errors
    // ========================================================================
    /// Unknown requested state.
    #[error("Unknown state '{0}' (expected merged, deleted, replaced or overridden)")]
    UnknownState(String),

    /// A fact document does not have the expected shape.
    #[error("Invalid fact document '{name}': {message}")]
    InvalidFacts {
        /// Which document (want, have, ...)
        name: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // IO Errors
    // ========================================================================
    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error with source.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new grammar parse error.
    pub fn grammar_parse(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::GrammarParse {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    /// Creates a new invalid facts error.
    pub fn invalid_facts(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFacts {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::GrammarParse { .. } | Error::GrammarValidation(_) => 2,
            Error::ModeNotFound(_) | Error::UnknownState(_) => 3,
            Error::InvalidFacts { .. } => 4,
            Error::FileNotFound(_) | Error::Io(_) => 5,
            _ => 1,
        }
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Adds context with a closure that is only evaluated on error.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Other {
            message: message.into(),
            source: Some(Box::new(e)),
        })
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| Error::Other {
            message: f().into(),
            source: Some(Box::new(e)),
        })
    }
}
