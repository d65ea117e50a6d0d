//! Error types for the polyhedral scheduler.
//!
//! Errors are organized by the phase that produces them: reading the
//! affine textual grammar, constructing programs and statements,
//! rewriting schedules, and generating the loop AST.  There is no
//! recovery path anywhere; every error aborts the current run.

use std::fmt;
use thiserror::Error;

/// Top-level error type for the scheduler.
#[derive(Error, Debug)]
pub enum PolyschedError {
    /// Error while reading affine set/map text
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error while constructing a program, statement, or invariant
    #[error("Construction error: {0}")]
    Construction(#[from] ConstructionError),

    /// Error while rewriting a schedule
    #[error("Transformation error: {0}")]
    Transform(#[from] TransformError),

    /// Error during AST generation
    #[error("Code generation error: {0}")]
    Codegen(#[from] CodegenError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error while parsing the affine set/map textual grammar.
#[derive(Error, Debug, Clone)]
pub struct ParseError {
    /// The error message
    pub message: String,
    /// The kind of parse error
    pub kind: ParseErrorKind,
    /// The input that failed to parse
    pub input: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in `{}`", self.message, self.input)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Missing `{`, `}`, `[`, `]`, `:` or `->`
    MissingDelimiter,
    /// Unexpected character or token
    UnexpectedToken,
    /// Identifier is neither a dimension nor a declared parameter
    UnknownIdentifier,
    /// Product of two non-constant expressions
    NonAffine,
    /// Empty input where a tuple or expression was expected
    Empty,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            input: input.into(),
        }
    }
}

/// Error while constructing a program, statement, or invariant.
#[derive(Error, Debug, Clone)]
pub struct ConstructionError {
    /// The error message
    pub message: String,
    /// The kind of construction error
    pub kind: ConstructionErrorKind,
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionErrorKind {
    /// Empty program, statement, buffer, or invariant name
    EmptyName,
    /// More than one statement carries the requested name
    DuplicateName,
    /// No statement carries the requested name
    UnknownStatement,
    /// Schedule or access domain tuple disagrees with the statement name
    TupleMismatch,
    /// A `(statement, level)` key already carries a tag
    DoubleTag,
}

impl ConstructionError {
    pub fn new(kind: ConstructionErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

/// Error while rewriting a schedule.
#[derive(Error, Debug, Clone)]
pub struct TransformError {
    /// The error message
    pub message: String,
    /// The kind of transformation error
    pub kind: TransformErrorKind,
    /// The transformation that failed
    pub transform: String,
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.message, self.transform)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformErrorKind {
    /// Dimension index outside the schedule range
    InvalidDimension,
    /// Split or tile size must be strictly positive
    InvalidSize,
    /// Tile requires two adjacent dimensions, outer first
    NonAdjacentTile,
    /// Ordering level outside a statement's schedule range
    InvalidLevel,
}

impl TransformError {
    pub fn new(
        kind: TransformErrorKind,
        transform: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            kind,
            transform: transform.into(),
        }
    }
}

/// Error during AST generation.
#[derive(Error, Debug, Clone)]
pub struct CodegenError {
    /// The error message
    pub message: String,
    /// The kind of codegen error
    pub kind: CodegenErrorKind,
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodegenErrorKind {
    /// No iterator binding could be solved for a domain dimension
    BindingUnsolvable,
    /// No storage index could be solved from the access relation
    AccessUnsolvable,
    /// A loop dimension has no finite bound in the time-processor domain
    UnboundedLoop,
}

impl CodegenError {
    pub fn new(kind: CodegenErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

/// Result type using PolyschedError.
pub type PolyResult<T> = Result<T, PolyschedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new(
            ParseErrorKind::MissingDelimiter,
            "missing `->`",
            "{ S[i] [o] }",
        );
        let s = format!("{}", err);
        assert!(s.contains("missing `->`"));
        assert!(s.contains("{ S[i] [o] }"));
    }

    #[test]
    fn test_transform_error_names_transform() {
        let err = TransformError::new(TransformErrorKind::InvalidSize, "split", "size must be > 0");
        assert!(format!("{}", err).contains("split"));
    }

    #[test]
    fn test_top_level_conversion() {
        let err: PolyschedError =
            ConstructionError::new(ConstructionErrorKind::EmptyName, "empty statement name")
                .into();
        assert!(matches!(err, PolyschedError::Construction(_)));
    }
}
