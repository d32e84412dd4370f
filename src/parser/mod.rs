//! Parser adapters.
//!
//! Tokenizing is delegated to `quick-xml`; this module turns its event
//! stream into a [`Document`] arena. It supports the parse-time switches of
//! [`ParseOptions`] and an incremental [`PushParser`] that runs the same
//! builder on a background thread.

mod entities;
pub mod push;
pub(crate) mod xml;

pub use push::PushParser;

use tracing::debug;

use crate::error::{ParseError, SourceLocation};
use crate::tree::Document;

/// Parse-time switches.
///
/// Every switch is per parse; nothing is process-wide.
///
/// ```
/// use xmlfacade::parser::ParseOptions;
///
/// let opts = ParseOptions::default()
///     .recover(true)
///     .no_blanks(true)
///     .substitute_entities(true);
/// assert!(opts.recover);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Collect errors as diagnostics and return the partial tree.
    pub recover: bool,
    /// Drop whitespace-only text nodes between elements.
    pub no_blanks: bool,
    /// Replace references to internal entities by their values instead of
    /// keeping entity reference nodes.
    pub substitute_entities: bool,
    /// Record that the external subset was requested. No I/O is performed.
    pub load_external_subset: bool,
    /// Parse with the lenient HTML rules.
    pub html: bool,
}

impl ParseOptions {
    /// Enables or disables error recovery mode.
    #[must_use]
    pub fn recover(mut self, yes: bool) -> Self {
        self.recover = yes;
        self
    }

    /// Enables or disables stripping of blank text nodes.
    #[must_use]
    pub fn no_blanks(mut self, yes: bool) -> Self {
        self.no_blanks = yes;
        self
    }

    /// Enables or disables internal entity substitution.
    #[must_use]
    pub fn substitute_entities(mut self, yes: bool) -> Self {
        self.substitute_entities = yes;
        self
    }

    /// Enables or disables the external subset request flag.
    #[must_use]
    pub fn load_external_subset(mut self, yes: bool) -> Self {
        self.load_external_subset = yes;
        self
    }

    /// Selects the HTML dialect.
    #[must_use]
    pub fn html(mut self, yes: bool) -> Self {
        self.html = yes;
        self
    }
}

/// Parses an XML string with default options.
///
/// # Errors
///
/// Returns `ParseError` if the input is not well-formed XML.
pub fn parse_str(input: &str) -> Result<Document, ParseError> {
    parse_str_with_options(input, &ParseOptions::default())
}

/// Parses a string with the given options.
///
/// # Errors
///
/// Returns `ParseError` if the input is not well-formed and recovery mode
/// is not enabled. HTML parsing always recovers.
pub fn parse_str_with_options(input: &str, options: &ParseOptions) -> Result<Document, ParseError> {
    let input = input.strip_prefix('\u{FEFF}').unwrap_or(input);
    debug!(bytes = input.len(), html = options.html, "parsing");
    let reader = xml::reader(input.as_bytes());
    match xml::run(reader, options) {
        Ok(mut doc) => {
            for diag in &mut doc.diagnostics {
                diag.location = SourceLocation::from_offset(input, diag.location.byte_offset);
            }
            Ok(doc)
        }
        Err(mut err) => {
            err.location = SourceLocation::from_offset(input, err.location.byte_offset);
            for diag in &mut err.diagnostics {
                diag.location = SourceLocation::from_offset(input, diag.location.byte_offset);
            }
            Err(err)
        }
    }
}

/// Parses raw bytes, detecting their encoding first.
///
/// # Errors
///
/// Returns `ParseError` if the bytes cannot be decoded or the text does not
/// parse.
pub fn parse_bytes_with_options(input: &[u8], options: &ParseOptions) -> Result<Document, ParseError> {
    let text = crate::encoding::decode_to_utf8(input)
        .map_err(|e| ParseError::new(e.message, SourceLocation::default()))?;
    parse_str_with_options(&text, options)
}
