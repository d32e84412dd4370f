//! Qualified names (`prefix:local`).
//!
//! Parser adapters split names on the way in; the serializer and the path
//! computer join them back on the way out.

/// Splits a qualified name into its prefix and local part.
///
/// Only the first colon separates; `a:b:c` yields `(Some("a"), "b:c")`.
///
/// ```
/// use xmlfacade::util::qname::split_qname;
///
/// assert_eq!(split_qname("svg:rect"), (Some("svg"), "rect"));
/// assert_eq!(split_qname("div"), (None, "div"));
/// ```
#[must_use]
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.find(':') {
        Some(pos) => (Some(&qname[..pos]), &qname[pos + 1..]),
        None => (None, qname),
    }
}

/// Joins an optional prefix and a local name into `prefix:local`.
///
/// An empty prefix is treated like no prefix.
#[must_use]
pub fn join_qname(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) if !p.is_empty() => {
            let mut out = String::with_capacity(p.len() + 1 + local.len());
            out.push_str(p);
            out.push(':');
            out.push_str(local);
            out
        }
        _ => local.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_qname_with_prefix() {
        assert_eq!(split_qname("xml:lang"), (Some("xml"), "lang"));
    }

    #[test]
    fn test_split_qname_without_prefix() {
        assert_eq!(split_qname("div"), (None, "div"));
    }

    #[test]
    fn test_split_qname_multiple_colons() {
        assert_eq!(split_qname("a:b:c"), (Some("a"), "b:c"));
    }

    #[test]
    fn test_join_qname() {
        assert_eq!(join_qname(Some("svg"), "rect"), "svg:rect");
        assert_eq!(join_qname(None, "rect"), "rect");
        assert_eq!(join_qname(Some(""), "rect"), "rect");
    }

    #[test]
    fn test_join_inverts_split() {
        let (prefix, local) = split_qname("xlink:href");
        assert_eq!(join_qname(prefix, local), "xlink:href");
    }
}
