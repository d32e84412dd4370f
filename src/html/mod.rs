//! Lenient HTML front end.
//!
//! Runs the shared tree builder in its HTML dialect:
//!
//! - element and attribute names are lower-cased
//! - void elements (`<br>`, `<img>`, ...) never take children
//! - unquoted and valueless attributes are accepted
//! - stray end tags are ignored, unclosed elements are closed implicitly
//! - a handful of optional end tags are implied (`<p>` before a block, ...)
//! - HTML named character references are decoded, unknown ones kept as text
//!
//! The resulting [`Document`] is flagged as HTML, so serializing it through
//! [`XmlDocument`](crate::XmlDocument) uses the HTML dialect by default.
//!
//! ```
//! use xmlfacade::html::parse_html;
//!
//! let doc = parse_html("<P CLASS=x>Hello<BR>world</P>").unwrap();
//! let p = doc.root_element().unwrap();
//! assert_eq!(doc.node_name(p), Some("p"));
//! assert_eq!(doc.attribute(p, "class"), Some("x"));
//! ```

use crate::error::ParseError;
use crate::parser::{parse_str_with_options, ParseOptions};
use crate::tree::Document;

/// Parses an HTML string with default options.
///
/// # Errors
///
/// Returns `ParseError` only when the input cannot be decoded at all; every
/// markup problem is recorded in `Document::diagnostics` instead.
pub fn parse_html(input: &str) -> Result<Document, ParseError> {
    parse_html_with_options(input, &ParseOptions::default())
}

/// Parses an HTML string; `options.html` is forced on.
///
/// # Errors
///
/// See [`parse_html`].
pub fn parse_html_with_options(input: &str, options: &ParseOptions) -> Result<Document, ParseError> {
    let options = options.clone().html(true);
    parse_str_with_options(input, &options)
}

/// Returns true if `tag` (lower case) is a void element.
pub(crate) fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "basefont"
            | "br"
            | "col"
            | "embed"
            | "frame"
            | "hr"
            | "img"
            | "input"
            | "isindex"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Returns true if opening `tag` implicitly ends an open `open_tag`.
pub(crate) fn auto_closes(open_tag: &str, tag: &str) -> bool {
    match open_tag {
        "p" => matches!(
            tag,
            "p" | "div"
                | "ul"
                | "ol"
                | "dl"
                | "pre"
                | "table"
                | "blockquote"
                | "h1"
                | "h2"
                | "h3"
                | "h4"
                | "h5"
                | "h6"
                | "hr"
                | "form"
                | "section"
                | "article"
                | "header"
                | "footer"
        ),
        "li" => tag == "li",
        "dt" | "dd" => matches!(tag, "dt" | "dd"),
        "tr" => tag == "tr",
        "td" | "th" => matches!(tag, "td" | "th" | "tr"),
        "option" => matches!(tag, "option" | "optgroup"),
        "head" => matches!(tag, "body" | "frameset"),
        _ => false,
    }
}

/// Looks up an HTML named character reference (without `&` and `;`).
///
/// Covers the Latin-1 symbols and typographic punctuation that show up in
/// practice; anything else is left in the text verbatim.
pub(crate) fn entity(name: &str) -> Option<&'static str> {
    let value = match name {
        "nbsp" => "\u{A0}",
        "iexcl" => "\u{A1}",
        "cent" => "\u{A2}",
        "pound" => "\u{A3}",
        "curren" => "\u{A4}",
        "yen" => "\u{A5}",
        "brvbar" => "\u{A6}",
        "sect" => "\u{A7}",
        "uml" => "\u{A8}",
        "copy" => "\u{A9}",
        "ordf" => "\u{AA}",
        "laquo" => "\u{AB}",
        "not" => "\u{AC}",
        "shy" => "\u{AD}",
        "reg" => "\u{AE}",
        "macr" => "\u{AF}",
        "deg" => "\u{B0}",
        "plusmn" => "\u{B1}",
        "sup2" => "\u{B2}",
        "sup3" => "\u{B3}",
        "acute" => "\u{B4}",
        "micro" => "\u{B5}",
        "para" => "\u{B6}",
        "middot" => "\u{B7}",
        "cedil" => "\u{B8}",
        "sup1" => "\u{B9}",
        "ordm" => "\u{BA}",
        "raquo" => "\u{BB}",
        "frac14" => "\u{BC}",
        "frac12" => "\u{BD}",
        "frac34" => "\u{BE}",
        "iquest" => "\u{BF}",
        "Agrave" => "\u{C0}",
        "Aacute" => "\u{C1}",
        "Auml" => "\u{C4}",
        "Ccedil" => "\u{C7}",
        "Eacute" => "\u{C9}",
        "Ouml" => "\u{D6}",
        "times" => "\u{D7}",
        "Uuml" => "\u{DC}",
        "szlig" => "\u{DF}",
        "agrave" => "\u{E0}",
        "aacute" => "\u{E1}",
        "auml" => "\u{E4}",
        "ccedil" => "\u{E7}",
        "egrave" => "\u{E8}",
        "eacute" => "\u{E9}",
        "ouml" => "\u{F6}",
        "divide" => "\u{F7}",
        "uuml" => "\u{FC}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "sbquo" => "\u{201A}",
        "ldquo" => "\u{201C}",
        "rdquo" => "\u{201D}",
        "bdquo" => "\u{201E}",
        "dagger" => "\u{2020}",
        "bull" => "\u{2022}",
        "hellip" => "\u{2026}",
        "prime" => "\u{2032}",
        "euro" => "\u{20AC}",
        "trade" => "\u{2122}",
        "larr" => "\u{2190}",
        "rarr" => "\u{2192}",
        "ne" => "\u{2260}",
        "le" => "\u{2264}",
        "ge" => "\u{2265}",
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tree::NodeType;

    #[test]
    fn test_names_are_lowercased() {
        let doc = parse_html("<DIV ID=main><SPAN>x</SPAN></DIV>").unwrap();
        let div = doc.root_element().unwrap();
        assert_eq!(doc.node_name(div), Some("div"));
        assert_eq!(doc.attribute(div, "id"), Some("main"));
        let span = doc.first_child(div).unwrap();
        assert_eq!(doc.node_name(span), Some("span"));
        assert!(doc.html);
    }

    #[test]
    fn test_void_elements_take_no_children() {
        let doc = parse_html("<p>a<br>b<img src=x.png>c</p>").unwrap();
        let p = doc.root_element().unwrap();
        let names: Vec<_> = doc
            .children(p)
            .filter(|&c| doc.node_type(c) == NodeType::Element)
            .map(|c| doc.node_name(c).unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["br", "img"]);
        assert_eq!(doc.text_content(p), "abc");
    }

    #[test]
    fn test_stray_end_tag_ignored() {
        let doc = parse_html("<div>a</span>b</div>").unwrap();
        let div = doc.root_element().unwrap();
        assert_eq!(doc.text_content(div), "ab");
    }

    #[test]
    fn test_unclosed_elements_closed_at_end() {
        let doc = parse_html("<html><body><div>text").unwrap();
        let html = doc.root_element().unwrap();
        assert_eq!(doc.text_content(html), "text");
    }

    #[test]
    fn test_end_tag_closes_intermediate() {
        let doc = parse_html("<div><b>bold</div><p>after</p>").unwrap();
        let div = doc.root_element().unwrap();
        let b = doc.first_child(div).unwrap();
        assert_eq!(doc.node_name(b), Some("b"));
        assert_eq!(doc.next_sibling(div).map(|n| doc.node_name(n)), Some(Some("p")));
    }

    #[test]
    fn test_paragraph_auto_close() {
        let doc = parse_html("<div><p>one<p>two</div>").unwrap();
        let div = doc.root_element().unwrap();
        assert_eq!(doc.children(div).count(), 2);
    }

    #[test]
    fn test_html_entities() {
        let doc = parse_html("<p>a&nbsp;b &copy; &bogus; &amp;</p>").unwrap();
        let p = doc.root_element().unwrap();
        assert_eq!(doc.text_content(p), "a\u{A0}b \u{A9} &bogus; &");
    }

    #[test]
    fn test_doctype_is_kept() {
        let doc = parse_html("<!DOCTYPE html><html></html>").unwrap();
        assert!(doc.doctype().is_some());
    }

    #[test]
    fn test_auto_closes_table() {
        assert!(auto_closes("p", "div"));
        assert!(auto_closes("li", "li"));
        assert!(!auto_closes("div", "p"));
    }
}
