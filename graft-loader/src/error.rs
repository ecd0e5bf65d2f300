//! Error types for relation loading with actionable messages.
//!
//! Every failure carries an [`ErrorCode`] for programmatic handling plus an
//! [`ErrorContext`] describing what was being loaded when it happened.
//!
//! # Error Codes
//!
//! Error codes follow a pattern: G{category}{number}
//! - 1xxx: Graph errors (invalid entity, malformed relation path, not found)
//! - 5xxx: Fetch errors
//! - 6xxx: Serialization errors
//! - 7xxx: Configuration errors
//! - 9xxx: Internal errors
//!
//! # Creating Errors
//!
//! ```rust
//! use graft_loader::{ErrorCode, LoadError};
//!
//! let err = LoadError::missing_resolver("article");
//! assert_eq!(err.code, ErrorCode::MissingResolver);
//! assert!(err.is_fatal());
//!
//! let err = LoadError::not_found("user", 15);
//! assert!(!err.is_fatal());
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Graph errors (1xxx)
    /// Entity or reference constructed without a valid id and type (G1001).
    InvalidEntity = 1001,
    /// Relation path could not be parsed (G1002).
    MalformedRelationPath = 1002,
    /// Store key could not be derived from query parameters (G1003).
    InvalidStoreKey = 1003,
    /// Requested record was absent from a fetch result (G1004).
    RecordNotFound = 1004,

    // Fetch errors (5xxx)
    /// The fetcher failed to resolve a batch (G5001).
    FetchFailed = 5001,

    // Data errors (6xxx)
    /// Serialization error (G6001).
    Serialization = 6001,
    /// Deserialization error (G6002).
    Deserialization = 6002,

    // Configuration errors (7xxx)
    /// Invalid configuration (G7001).
    InvalidConfiguration = 7001,
    /// No resolver mapped for a type (G7002).
    MissingResolver = 7002,

    // Internal errors (9xxx)
    /// Internal error (G9001).
    Internal = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "G1001").
    pub fn code(&self) -> String {
        format!("G{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidEntity => "Invalid entity",
            Self::MalformedRelationPath => "Malformed relation path",
            Self::InvalidStoreKey => "Invalid store key",
            Self::RecordNotFound => "Record not found",
            Self::FetchFailed => "Fetch failed",
            Self::Serialization => "Serialization error",
            Self::Deserialization => "Deserialization error",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::MissingResolver => "No resolver registered",
            Self::Internal => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The entity type involved.
    pub type_name: Option<String>,
    /// The field involved.
    pub field: Option<String>,
    /// The relation set being loaded.
    pub relations: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<String>,
    /// Help text.
    pub help: Option<String>,
}

/// Errors that can occur while ingesting, loading or serializing a graph.
#[derive(Error, Debug)]
pub struct LoadError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl LoadError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Set the entity type.
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.context.type_name = Some(type_name.into());
        self
    }

    /// Set the field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.context.field = Some(field.into());
        self
    }

    /// Set the relation set.
    pub fn with_relations(mut self, relations: impl Into<String>) -> Self {
        self.context.relations = Some(relations.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(suggestion.into());
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Constructor Functions ==============

    /// Create an invalid entity error.
    pub fn invalid_entity(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::InvalidEntity, format!("Invalid entity: {}", message))
            .with_suggestion("Entities and references need a non-empty `id` and `type`")
    }

    /// Create a malformed relation path error.
    pub fn malformed_relation_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        let path = path.into();
        let reason = reason.into();
        Self::new(
            ErrorCode::MalformedRelationPath,
            format!("Malformed relation path '{}': {}", path, reason),
        )
        .with_relations(&path)
        .with_suggestion("Use comma separated dot paths such as \"author.profile,categories\"")
        .with_suggestion("Or a bare non-negative integer to resolve every relation N levels deep")
    }

    /// Create an invalid store key error.
    pub fn invalid_store_key(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::InvalidStoreKey, format!("Invalid store key: {}", message))
    }

    /// Create a not found error for a record missing from a fetch result.
    pub fn not_found(type_name: impl Into<String>, id: impl fmt::Display) -> Self {
        let type_name = type_name.into();
        Self::new(
            ErrorCode::RecordNotFound,
            format!("No {} record found with id {}", type_name, id),
        )
        .with_type(&type_name)
    }

    /// Create a fetch failure error.
    pub fn fetch_failed(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        let type_name = type_name.into();
        let message = message.into();
        Self::new(
            ErrorCode::FetchFailed,
            format!("Fetching {} failed: {}", type_name, message),
        )
        .with_type(&type_name)
    }

    /// Create a missing resolver configuration error.
    pub fn missing_resolver(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self::new(
            ErrorCode::MissingResolver,
            format!("No resolver registered for type '{}'", type_name),
        )
        .with_type(&type_name)
        .with_suggestion(format!("Register a resolver with registry.map(\"{}\", resolver)", type_name))
        .with_help("A fallback callback registered with registry.fallback(..) is consulted before failing")
    }

    /// Create an invalid configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            ErrorCode::InvalidConfiguration,
            format!("Invalid configuration: {}", message),
        )
    }

    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Serialization, message.into())
    }

    /// Create a deserialization error.
    pub fn deserialization(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            ErrorCode::Deserialization,
            format!("Failed to deserialize document: {}", message),
        )
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::Internal, format!("Internal error: {}", message))
            .with_help("This is likely a bug in graft - please report it")
    }

    // ============== Error Checks ==============

    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::RecordNotFound
    }

    /// Check if this is a configuration error.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::InvalidConfiguration | ErrorCode::MissingResolver
        )
    }

    /// Check if this error aborts a load.
    ///
    /// Only a record missing from a fetch result is non-fatal; it leaves the
    /// reference unresolved in place.
    pub fn is_fatal(&self) -> bool {
        !self.is_not_found()
    }

    /// Display the full error with all context and suggestions.
    pub fn display_full(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error [{}]: {}\n", self.code.code(), self.message));

        if let Some(ref op) = self.context.operation {
            output.push_str(&format!("  → While: {}\n", op));
        }
        if let Some(ref type_name) = self.context.type_name {
            output.push_str(&format!("  → Type: {}\n", type_name));
        }
        if let Some(ref field) = self.context.field {
            output.push_str(&format!("  → Field: {}\n", field));
        }
        if let Some(ref relations) = self.context.relations {
            output.push_str(&format!("  → Relations: {}\n", relations));
        }

        if !self.context.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        if let Some(ref help) = self.context.help {
            output.push_str(&format!("\nHelp: {}\n", help));
        }

        output
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        LoadError::serialization(err.to_string()).with_source(err)
    }
}

impl From<toml::de::Error> for LoadError {
    fn from(err: toml::de::Error) -> Self {
        LoadError::configuration(err.to_string()).with_source(err)
    }
}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        LoadError::configuration(err.to_string()).with_source(err)
    }
}

/// Helper for creating errors with context.
#[macro_export]
macro_rules! load_error {
    ($code:expr, $msg:expr) => {
        $crate::error::LoadError::new($code, $msg)
    };
    ($code:expr, $msg:expr, $($key:ident = $value:expr),+ $(,)?) => {{
        let mut err = $crate::error::LoadError::new($code, $msg);
        $(
            err = err.$key($value);
        )+
        err
    }};
}
