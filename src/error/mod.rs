//! Error types and diagnostics.
//!
//! [`Error`] is the crate-wide error returned by the wrapped document, the
//! serializer and the declaration extractor. The parser adapters report
//! [`ParseError`], which carries a source location and every diagnostic
//! collected before the failure; it converts into [`Error::Parse`].
//!
//! In **recovery mode** the adapters collect problems into a
//! `Vec<ParseDiagnostic>` on the document instead of failing.

use std::fmt;

use crate::encoding::EncodingError;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by wrapping, serializing and declaration extraction.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A document was serialized but has no root element.
    #[error("document has no root element")]
    MissingRoot,

    /// A node handle does not address a node of this document.
    #[error("unknown node kind for node #{0}")]
    UnknownNodeKind(u32),

    /// A declaration node lacks the name attribute it needs.
    #[error("malformed {kind} declaration: missing '{attribute}'")]
    MalformedDeclaration {
        /// Tag of the declaration node (`elementDecl`, `notationDecl`, ...).
        kind: String,
        /// The attribute that was absent.
        attribute: &'static str,
    },

    /// The input could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// An output encoding is unknown or cannot represent the text.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// Severity level for a parse diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorSeverity {
    /// A non-fatal issue that doesn't prevent parsing.
    Warning,
    /// A recoverable error. The parser continues but the input is malformed.
    Error,
    /// An unrecoverable error; parsing stops.
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Fatal => write!(f, "fatal error"),
        }
    }
}

/// Source location within the parsed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (in characters, not bytes).
    pub column: u32,
    /// 0-based byte offset from the start of the input.
    pub byte_offset: usize,
}

impl SourceLocation {
    /// Computes the line and column of `byte_offset` within `input`.
    ///
    /// Offsets past the end (or inside a multi-byte character) are clamped
    /// to the nearest preceding character boundary.
    #[must_use]
    pub fn from_offset(input: &str, byte_offset: usize) -> Self {
        let mut end = byte_offset.min(input.len());
        while !input.is_char_boundary(end) {
            end -= 1;
        }
        let before = &input[..end];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        Self {
            line: u32::try_from(line).unwrap_or(u32::MAX),
            column: u32::try_from(column).unwrap_or(u32::MAX),
            byte_offset,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A single diagnostic emitted during parsing.
#[derive(Debug, Clone)]
pub struct ParseDiagnostic {
    /// The severity of this diagnostic.
    pub severity: ErrorSeverity,
    /// Human-readable error message.
    pub message: String,
    /// Where in the source this error occurred.
    pub location: SourceLocation,
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} at {}",
            self.severity, self.message, self.location
        )
    }
}

/// The error type returned when parsing fails.
#[derive(Debug, Clone, thiserror::Error)]
#[error("parse error at {location}: {message}")]
pub struct ParseError {
    /// The primary error message.
    pub message: String,
    /// Where in the source the fatal error occurred.
    pub location: SourceLocation,
    /// All diagnostics collected before the fatal error.
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl ParseError {
    /// Creates a parse error with no collected diagnostics.
    pub fn new(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            message: message.into(),
            location,
            diagnostics: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_location_display() {
        let loc = SourceLocation {
            line: 10,
            column: 5,
            byte_offset: 42,
        };
        assert_eq!(loc.to_string(), "10:5");
    }

    #[test]
    fn test_source_location_from_offset() {
        let loc = SourceLocation::from_offset("<a>\n  <b>", 6);
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 3);
        assert_eq!(loc.byte_offset, 6);
    }

    #[test]
    fn test_source_location_from_offset_past_end() {
        let loc = SourceLocation::from_offset("ab", 10);
        assert_eq!(loc.line, 1);
        assert_eq!(loc.column, 3);
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new(
            "unexpected end of input",
            SourceLocation {
                line: 1,
                column: 15,
                byte_offset: 14,
            },
        );
        assert_eq!(
            err.to_string(),
            "parse error at 1:15: unexpected end of input"
        );
    }

    #[test]
    fn test_parse_diagnostic_display() {
        let diag = ParseDiagnostic {
            severity: ErrorSeverity::Warning,
            message: "attribute value not quoted".to_string(),
            location: SourceLocation {
                line: 3,
                column: 10,
                byte_offset: 50,
            },
        };
        assert_eq!(
            diag.to_string(),
            "warning: attribute value not quoted at 3:10"
        );
    }

    #[test]
    fn test_error_display() {
        assert_eq!(Error::MissingRoot.to_string(), "document has no root element");
        assert_eq!(
            Error::UnknownNodeKind(99).to_string(),
            "unknown node kind for node #99"
        );
        let err = Error::MalformedDeclaration {
            kind: "notationDecl".to_string(),
            attribute: "name",
        };
        assert_eq!(
            err.to_string(),
            "malformed notationDecl declaration: missing 'name'"
        );
    }

    #[test]
    fn test_parse_error_converts() {
        let err: Error = ParseError::new("bad", SourceLocation::default()).into();
        assert!(matches!(err, Error::Parse(_)));
        assert_eq!(err.to_string(), "parse error at 0:0: bad");
    }
}
