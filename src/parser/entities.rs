//! Reference decoding for character data and attribute values.
//!
//! `quick-xml` hands us raw, still-escaped text. This module splits it into
//! literal runs and general entity references, decoding character references
//! (`&#38;`, `&#x26;`) and the five predefined entities on the way.

/// A piece of decoded character data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    /// Literal text with character and known references already decoded.
    Text(String),
    /// A reference to a general entity that was not resolved.
    Ref(String),
}

/// Returns the replacement for one of the five predefined XML entities.
pub(crate) fn predefined(name: &str) -> Option<&'static str> {
    match name {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        _ => None,
    }
}

/// Returns `true` if `c` is a valid `Char` per XML 1.0 §2.2.
pub(crate) fn is_xml_char(c: char) -> bool {
    matches!(c as u32,
        0x09 | 0x0A | 0x0D | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x0001_0000..=0x0010_FFFF
    )
}

/// Decodes the body of a character reference (the part between `&#` and
/// `;`), e.g. `"x41"` or `"65"`.
pub(crate) fn char_ref(body: &str) -> Option<char> {
    let value = match body.strip_prefix('x') {
        Some(hex) if !hex.is_empty() => u32::from_str_radix(hex, 16).ok()?,
        Some(_) => return None,
        None if !body.is_empty() => body.parse::<u32>().ok()?,
        None => return None,
    };
    char::from_u32(value).filter(|&c| is_xml_char(c))
}

/// Splits `raw` into text runs and entity references.
///
/// `resolve` is consulted for every named reference; a `Some` result is
/// spliced in as text, `None` yields a [`Segment::Ref`]. When `lenient` is
/// set (HTML), a `&` that does not start a well-formed reference is kept as
/// a literal character instead of being an error.
///
/// # Errors
///
/// Returns a message describing the first malformed reference.
pub(crate) fn decode(
    raw: &str,
    lenient: bool,
    resolve: &dyn Fn(&str) -> Option<String>,
) -> Result<Vec<Segment>, String> {
    let mut segments = Vec::new();
    let mut text = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(amp) = rest.find('&') {
        text.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let Some(semi) = after.find(';').filter(|&i| is_reference_body(&after[..i])) else {
            if lenient {
                text.push('&');
                rest = after;
                continue;
            }
            return Err("EntityRef: expecting ';'".to_string());
        };
        let body = &after[..semi];
        rest = &after[semi + 1..];

        if let Some(num) = body.strip_prefix('#') {
            match char_ref(num) {
                Some(c) => text.push(c),
                None if lenient => {
                    text.push('&');
                    text.push_str(body);
                    text.push(';');
                }
                None => return Err(format!("invalid character reference &{body};")),
            }
        } else if let Some(value) = predefined(body) {
            text.push_str(value);
        } else if let Some(value) = resolve(body) {
            text.push_str(&value);
        } else if lenient {
            text.push('&');
            text.push_str(body);
            text.push(';');
        } else {
            if !text.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut text)));
            }
            segments.push(Segment::Ref(body.to_string()));
        }
    }
    text.push_str(rest);
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

/// Decodes `raw` and flattens unresolved references back to `&name;`.
///
/// Used for attribute values, which cannot hold reference nodes.
pub(crate) fn decode_flat(
    raw: &str,
    lenient: bool,
    resolve: &dyn Fn(&str) -> Option<String>,
) -> Result<String, String> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    for segment in decode(raw, lenient, resolve)? {
        match segment {
            Segment::Text(t) => out.push_str(&t),
            Segment::Ref(name) => {
                out.push('&');
                out.push_str(&name);
                out.push(';');
            }
        }
    }
    Ok(out)
}

fn is_reference_body(body: &str) -> bool {
    !body.is_empty()
        && body
            .chars()
            .all(|c| c == '#' || c == '-' || c == '.' || c == '_' || c == ':' || c.is_alphanumeric())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn none(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_decode_predefined_and_char_refs() {
        let segs = decode("a &lt;&amp;&gt; &#65;&#x42;", false, &none).unwrap();
        assert_eq!(segs, vec![Segment::Text("a <&> AB".to_string())]);
    }

    #[test]
    fn test_decode_unknown_entity_becomes_ref() {
        let segs = decode("x&foo;y", false, &none).unwrap();
        assert_eq!(
            segs,
            vec![
                Segment::Text("x".to_string()),
                Segment::Ref("foo".to_string()),
                Segment::Text("y".to_string()),
            ]
        );
    }

    #[test]
    fn test_decode_resolved_entity_is_spliced() {
        let resolve = |name: &str| (name == "who").then(|| "world".to_string());
        let segs = decode("hello &who;!", false, &resolve).unwrap();
        assert_eq!(segs, vec![Segment::Text("hello world!".to_string())]);
    }

    #[test]
    fn test_decode_bare_ampersand() {
        assert!(decode("a & b", false, &none).is_err());
        let segs = decode("a & b", true, &none).unwrap();
        assert_eq!(segs, vec![Segment::Text("a & b".to_string())]);
    }

    #[test]
    fn test_decode_invalid_char_ref() {
        assert!(decode("&#0;", false, &none).is_err());
        assert!(decode("&#xZZ;", false, &none).is_err());
    }

    #[test]
    fn test_decode_flat_keeps_reference_text() {
        let out = decode_flat("a&ext;b", false, &none).unwrap();
        assert_eq!(out, "a&ext;b");
    }

    #[test]
    fn test_char_ref_bodies() {
        assert_eq!(char_ref("x3C"), Some('<'));
        assert_eq!(char_ref("13"), Some('\r'));
        assert_eq!(char_ref("x"), None);
        assert_eq!(char_ref(""), None);
    }
}
