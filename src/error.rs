//! Error types for the mission runner

use std::fmt;
use thiserror::Error;

/// Position of a token in a source blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed)
    pub column: u32,
    /// Byte offset in source
    pub offset: usize,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Render the offending line of `source` with a caret under `location`,
/// plus one line of context on either side.
pub fn format_error_context(source: &str, location: &SourceLocation) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let line_idx = location.line.saturating_sub(1) as usize;

    if line_idx >= lines.len() {
        return String::new();
    }

    let width = format!("{}", location.line + 1).len().max(3);
    let mut out = String::new();

    if line_idx > 0 {
        out.push_str(&format!(
            "{:>width$} | {}\n",
            location.line - 1,
            lines[line_idx - 1],
            width = width
        ));
    }

    out.push_str(&format!(
        "{:>width$} | {}\n",
        location.line,
        lines[line_idx],
        width = width
    ));

    let caret_offset = location.column.saturating_sub(1) as usize;
    out.push_str(&format!(
        "{:>width$} | {}^\n",
        "",
        " ".repeat(caret_offset),
        width = width
    ));

    if line_idx + 1 < lines.len() {
        out.push_str(&format!(
            "{:>width$} | {}\n",
            location.line + 1,
            lines[line_idx + 1],
            width = width
        ));
    }

    out
}

/// Main error type for the mission runner
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Invalid token or character in a source blob
    #[error("SyntaxError: {message} at {location}{}", if source_context.is_empty() { String::new() } else { format!("\n{}", source_context) })]
    LexerError {
        message: String,
        location: SourceLocation,
        source_context: String,
    },

    /// Token stream does not form a valid program
    #[error("SyntaxError: {message} at {location}{}", if source_context.is_empty() { String::new() } else { format!("\n{}", source_context) })]
    ParseError {
        message: String,
        location: SourceLocation,
        source_context: String,
    },

    /// Host-side runtime failure that never became a script value
    #[error("{kind}: {message}")]
    RuntimeError { kind: ErrorKind, message: String },

    /// A script value was thrown and nothing caught it
    #[error("{name}: {message}")]
    Uncaught { name: String, message: String },

    /// Resource limit exceeded while executing learner or test code
    #[error("ResourceLimitError: {kind}: {message}")]
    ResourceLimitError {
        kind: ResourceLimitKind,
        message: String,
    },

    /// Invalid runner configuration
    #[error("ConfigError: {0}")]
    ConfigError(String),

    /// Persistence collaborator failed
    #[error("StorageError: {0}")]
    StorageError(String),

    /// Engine bug or broken invariant
    #[error("InternalError: {0}")]
    InternalError(String),

    #[error("IOError: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

/// Resource limit kinds enforced by the sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceLimitKind {
    /// Wall-clock deadline exceeded
    TimeLimit,
    /// Interpreter step budget exhausted
    OperationLimit,
    /// Call stack depth limit exceeded
    StackDepthLimit,
}

impl fmt::Display for ResourceLimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceLimitKind::TimeLimit => write!(f, "TimeLimit"),
            ResourceLimitKind::OperationLimit => write!(f, "OperationLimit"),
            ResourceLimitKind::StackDepthLimit => write!(f, "StackDepthLimit"),
        }
    }
}

/// Script-visible error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum ErrorKind {
    TypeError,
    ReferenceError,
    RangeError,
    SyntaxError,
    /// Plain `Error`, including assertion failures
    GenericError,
}

impl ErrorKind {
    /// Constructor name as seen by scripts
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::GenericError => "Error",
        }
    }

    /// Reverse of [`ErrorKind::name`]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "TypeError" => Some(ErrorKind::TypeError),
            "ReferenceError" => Some(ErrorKind::ReferenceError),
            "RangeError" => Some(ErrorKind::RangeError),
            "SyntaxError" => Some(ErrorKind::SyntaxError),
            "Error" => Some(ErrorKind::GenericError),
            _ => None,
        }
    }

    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::GenericError,
        ErrorKind::TypeError,
        ErrorKind::RangeError,
        ErrorKind::ReferenceError,
        ErrorKind::SyntaxError,
    ];
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Error {
    /// Create a new lexer error with source context
    pub fn lexer_error_with_context(
        message: impl Into<String>,
        location: SourceLocation,
        source: &str,
    ) -> Self {
        Error::LexerError {
            message: message.into(),
            source_context: format_error_context(source, &location),
            location,
        }
    }

    /// Create a new parse error with source context
    pub fn parse_error_with_context(
        message: impl Into<String>,
        location: SourceLocation,
        source: &str,
    ) -> Self {
        Error::ParseError {
            message: message.into(),
            source_context: format_error_context(source, &location),
            location,
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Error::RuntimeError {
            kind: ErrorKind::TypeError,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Error::InternalError(message.into())
    }

    pub fn time_limit_exceeded(elapsed_ms: u64, limit_ms: u64) -> Self {
        Error::ResourceLimitError {
            kind: ResourceLimitKind::TimeLimit,
            message: format!(
                "Execution time limit exceeded: {}ms elapsed, limit was {}ms",
                elapsed_ms, limit_ms
            ),
        }
    }

    pub fn operation_limit_exceeded(ops: u64, limit: u64) -> Self {
        Error::ResourceLimitError {
            kind: ResourceLimitKind::OperationLimit,
            message: format!(
                "Operation limit exceeded: {} operations executed, limit was {}",
                ops, limit
            ),
        }
    }

    pub fn nesting_depth_exceeded(limit: usize) -> Self {
        Error::ResourceLimitError {
            kind: ResourceLimitKind::StackDepthLimit,
            message: format!("Maximum nesting depth exceeded: limit was {}", limit),
        }
    }

    pub fn stack_depth_exceeded(depth: usize, limit: usize) -> Self {
        Error::ResourceLimitError {
            kind: ResourceLimitKind::StackDepthLimit,
            message: format!(
                "Call stack depth limit exceeded: {} frames, limit was {}",
                depth, limit
            ),
        }
    }

    /// Whether this error stops a run no matter where it was raised
    pub fn is_resource_limit(&self) -> bool {
        matches!(self, Error::ResourceLimitError { .. })
    }
}

/// Result type alias for the mission runner
pub type Result<T> = std::result::Result<T, Error>;

/// Standardized error message templates, following the wording scripts
/// would see from a mainstream engine.
pub mod messages {
    pub const NOT_A_FUNCTION: &str = "is not a function";
    pub const NOT_A_CONSTRUCTOR: &str = "is not a constructor";
    pub const NOT_ITERABLE: &str = "is not iterable";
    pub const IS_NOT_DEFINED: &str = "is not defined";
    pub const CIRCULAR_JSON: &str = "Converting circular structure to JSON";
    pub const INVALID_ARRAY_LENGTH: &str = "Invalid array length";
    pub const RADIX_OUT_OF_RANGE: &str = "toString() radix must be between 2 and 36";
    pub const DIGITS_OUT_OF_RANGE: &str = "toFixed() digits argument must be between 0 and 100";

    pub fn not_a_function(name: &str) -> String {
        format!("{} {}", name, NOT_A_FUNCTION)
    }

    pub fn not_a_constructor(name: &str) -> String {
        format!("{} {}", name, NOT_A_CONSTRUCTOR)
    }

    pub fn not_iterable(name: &str) -> String {
        format!("{} {}", name, NOT_ITERABLE)
    }

    pub fn not_defined(name: &str) -> String {
        format!("{} {}", name, IS_NOT_DEFINED)
    }

    pub fn before_initialization(name: &str) -> String {
        format!("Cannot access '{}' before initialization", name)
    }

    pub fn assignment_to_constant() -> String {
        "Assignment to constant variable.".to_string()
    }

    pub fn already_declared(name: &str) -> String {
        format!("Identifier '{}' has already been declared", name)
    }

    pub fn cannot_read_property(prop: &str, of: &str) -> String {
        format!("Cannot read properties of {} (reading '{}')", of, prop)
    }

    pub fn cannot_set_property(prop: &str, of: &str) -> String {
        format!("Cannot set properties of {} (setting '{}')", of, prop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_points_at_column() {
        let source = "let a = 1;\nlet b = ;\nlet c = 3;";
        let ctx = format_error_context(source, &SourceLocation::new(2, 9, 19));
        assert!(ctx.contains("  2 | let b = ;"), "{}", ctx);
        assert!(ctx.contains("    |         ^"), "{}", ctx);
        assert!(ctx.contains("  1 | let a = 1;"));
        assert!(ctx.contains("  3 | let c = 3;"));
    }

    #[test]
    fn test_error_context_out_of_range() {
        assert_eq!(format_error_context("x", &SourceLocation::new(9, 1, 0)), "");
    }

    #[test]
    fn test_display_formats() {
        let err = Error::Uncaught {
            name: "TypeError".into(),
            message: "x is not a function".into(),
        };
        assert_eq!(err.to_string(), "TypeError: x is not a function");

        let err = Error::operation_limit_exceeded(11, 10);
        assert!(err.is_resource_limit());
        assert!(err.to_string().starts_with("ResourceLimitError: OperationLimit"));
    }

    #[test]
    fn test_error_kind_names_round_trip() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ErrorKind::from_name("Nope"), None);
    }
}
