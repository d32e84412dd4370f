//! Character encodings on the way in and out.
//!
//! Input bytes are sniffed for a byte order mark and an `encoding=` pseudo
//! attribute and decoded to UTF-8 before parsing. On output, serialized text
//! is encoded into the resolved document encoding via `encoding_rs`.

use encoding_rs::Encoding;

/// An encoding label is unknown, or text/bytes do not fit it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("encoding error: {message}")]
pub struct EncodingError {
    /// A human-readable description of the problem.
    pub message: String,
}

impl EncodingError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Looks up an encoding by its label (case-insensitive, WHATWG aliases).
///
/// # Errors
///
/// Returns `EncodingError` if `encoding_rs` does not know the label.
pub fn lookup(label: &str) -> Result<&'static Encoding, EncodingError> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| EncodingError::new(format!("unsupported encoding: {label}")))
}

/// Detects the encoding of a byte stream from its byte order mark.
///
/// Returns the encoding name and the number of BOM bytes to skip. Without a
/// BOM the input is assumed to be UTF-8.
///
/// ```
/// use xmlfacade::encoding::detect_encoding;
///
/// assert_eq!(detect_encoding(b"\xEF\xBB\xBF<a/>"), ("UTF-8", 3));
/// assert_eq!(detect_encoding(b"<a/>"), ("UTF-8", 0));
/// ```
#[must_use]
pub fn detect_encoding(bytes: &[u8]) -> (&'static str, usize) {
    match bytes {
        [0xEF, 0xBB, 0xBF, ..] => ("UTF-8", 3),
        [0xFE, 0xFF, ..] => ("UTF-16BE", 2),
        [0xFF, 0xFE, ..] => ("UTF-16LE", 2),
        _ => ("UTF-8", 0),
    }
}

/// Decodes `bytes` from the named encoding into a UTF-8 `String`.
///
/// # Errors
///
/// Returns `EncodingError` if the label is unknown or the input contains
/// malformed sequences for that encoding.
pub fn transcode(bytes: &[u8], encoding_name: &str) -> Result<String, EncodingError> {
    let encoding = lookup(encoding_name)?;
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(EncodingError::new(format!(
            "malformed byte sequence for encoding {encoding_name}"
        )));
    }
    Ok(text.into_owned())
}

/// Decodes raw document bytes, detecting the encoding automatically.
///
/// The BOM decides first; then the `encoding=` of an XML declaration, read
/// from the ASCII-compatible prefix, overrides a BOM-less UTF-8 guess.
///
/// # Errors
///
/// Returns `EncodingError` if the detected or declared encoding is unknown
/// or the bytes are malformed for it.
pub fn decode_to_utf8(bytes: &[u8]) -> Result<String, EncodingError> {
    let (bom_encoding, skip) = detect_encoding(bytes);
    let content = &bytes[skip..];

    if bom_encoding != "UTF-8" {
        return transcode(content, bom_encoding);
    }

    match declared_encoding(content) {
        Some(declared) if !is_utf8_label(&declared) => transcode(content, &declared),
        _ => std::str::from_utf8(content)
            .map(str::to_string)
            .map_err(|_| EncodingError::new("input is not valid UTF-8")),
    }
}

/// Encodes UTF-8 `text` into the encoding named by `label`.
///
/// Characters the target cannot represent are an error rather than being
/// replaced with numeric character references.
///
/// # Errors
///
/// Returns `EncodingError` if the label is unknown or `text` contains a
/// character the encoding cannot represent.
pub fn encode(text: &str, label: &str) -> Result<Vec<u8>, EncodingError> {
    let encoding = lookup(label)?;
    // encoding_rs only encodes into UTF-8 for the UTF-16 family
    if encoding == encoding_rs::UTF_16LE || encoding == encoding_rs::UTF_16BE {
        let big_endian = encoding == encoding_rs::UTF_16BE;
        let mut out = Vec::with_capacity(text.len() * 2);
        for unit in text.encode_utf16() {
            let pair = if big_endian {
                unit.to_be_bytes()
            } else {
                unit.to_le_bytes()
            };
            out.extend_from_slice(&pair);
        }
        return Ok(out);
    }
    let (bytes, _, had_unmappable) = encoding.encode(text);
    if had_unmappable {
        return Err(EncodingError::new(format!(
            "text cannot be represented in {}",
            encoding.name()
        )));
    }
    Ok(bytes.into_owned())
}

/// Reads the `encoding` pseudo attribute of a leading XML declaration.
///
/// Works on raw bytes since the declaration is ASCII in every encoding that
/// can be detected without a BOM.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let scan = &bytes[..bytes.len().min(200)];
    if !scan.starts_with(b"<?xml") {
        return None;
    }
    let end = scan.windows(2).position(|w| w == b"?>")?;
    let decl = &scan[..end];
    let needle = b"encoding";
    let pos = decl.windows(needle.len()).position(|w| w == needle)?;
    let rest = trim_ascii_start(&decl[pos + needle.len()..]);
    let rest = trim_ascii_start(rest.strip_prefix(b"=")?);
    let (&quote, rest) = rest.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let close = rest.iter().position(|&b| b == quote)?;
    let value = &rest[..close];
    value
        .is_ascii()
        .then(|| String::from_utf8_lossy(value).into_owned())
}

fn trim_ascii_start(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .count();
    &bytes[skip..]
}

fn is_utf8_label(label: &str) -> bool {
    label.eq_ignore_ascii_case("utf-8") || label.eq_ignore_ascii_case("utf8")
}
