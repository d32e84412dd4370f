//! Event-to-tree builder shared by the XML, HTML and push front ends.
//!
//! `quick-xml` does the tokenizing; [`TreeBuilder`] turns its events into
//! arena nodes, keeping the open-element stack, the in-scope namespace
//! declarations and the internal entity table. The same builder runs in
//! two dialects: strict XML, and lenient HTML (lower-cased names, void
//! elements, implicit closing).

use std::collections::HashMap;
use std::io::BufRead;

use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, trace, warn};

use super::entities::{self, Segment};
use super::ParseOptions;
use crate::error::{ErrorSeverity, ParseDiagnostic, ParseError, SourceLocation};
use crate::tree::{Document, NodeId, NodeKind};
use crate::util::qname::split_qname;

/// Namespace bound to the `xml` prefix.
pub(crate) const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
/// Namespace of `xmlns` / `xmlns:*` declaration attributes.
pub(crate) const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// Creates a `quick-xml` reader configured for the builder.
///
/// End-tag matching is done by the builder itself so that recovery and
/// HTML implicit closing behave the same way.
pub(crate) fn reader<R: BufRead>(source: R) -> Reader<R> {
    let mut reader = Reader::from_reader(source);
    let config = reader.config_mut();
    config.trim_text(false);
    config.expand_empty_elements = false;
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    reader
}

/// Pulls every event out of `reader` into a fresh builder.
///
/// Locations in the result carry byte offsets only; callers holding the
/// whole input fill in lines and columns afterwards.
pub(crate) fn run<R: BufRead>(
    mut reader: Reader<R>,
    options: &ParseOptions,
) -> Result<Document, ParseError> {
    let mut builder = TreeBuilder::new(options);
    let mut buf = Vec::new();
    let mut last_error_at = None;

    loop {
        builder.position = offset(reader.buffer_position());
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(event) => builder.event(event)?,
            Err(err) => {
                let at = offset(reader.error_position());
                builder.position = at;
                builder.error(err.to_string())?;
                // the reader cannot make progress past this point
                if last_error_at == Some(at) {
                    break;
                }
                last_error_at = Some(at);
            }
        }
        buf.clear();
    }

    builder.position = offset(reader.buffer_position());
    builder.finish()
}

fn offset<T>(position: T) -> usize
where
    usize: TryFrom<T>,
{
    usize::try_from(position).unwrap_or(usize::MAX)
}

fn utf8(bytes: &[u8]) -> Result<&str, String> {
    std::str::from_utf8(bytes).map_err(|e| format!("invalid UTF-8 in input: {e}"))
}

/// One open element: its node, its qualified name as written, and the
/// namespace declarations it introduced.
struct Open {
    node: NodeId,
    qname: String,
    bindings: Vec<(Option<String>, String)>,
}

/// Builds a [`Document`] from a stream of `quick-xml` events.
pub(crate) struct TreeBuilder<'o> {
    doc: Document,
    options: &'o ParseOptions,
    open: Vec<Open>,
    entities: HashMap<String, String>,
    /// Byte offset of the event being handled.
    pub(crate) position: usize,
}

impl<'o> TreeBuilder<'o> {
    pub(crate) fn new(options: &'o ParseOptions) -> Self {
        let mut doc = Document::new();
        doc.html = options.html;
        doc.load_external_subset = options.load_external_subset;
        Self {
            doc,
            options,
            open: Vec::new(),
            entities: HashMap::new(),
            position: 0,
        }
    }

    fn html(&self) -> bool {
        self.options.html
    }

    /// Records a recoverable problem, or fails when not recovering.
    pub(crate) fn error(&mut self, message: impl Into<String>) -> Result<(), ParseError> {
        let message = message.into();
        let location = SourceLocation {
            byte_offset: self.position,
            ..SourceLocation::default()
        };
        if self.options.recover || self.html() {
            debug!(%message, offset = self.position, "recovered parse error");
            self.doc.diagnostics.push(ParseDiagnostic {
                severity: ErrorSeverity::Error,
                message,
                location,
            });
            Ok(())
        } else {
            Err(ParseError {
                message,
                location,
                diagnostics: std::mem::take(&mut self.doc.diagnostics),
            })
        }
    }

    fn checked<T>(&mut self, result: Result<T, String>) -> Result<Option<T>, ParseError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(message) => self.error(message).map(|()| None),
        }
    }

    fn current(&self) -> NodeId {
        self.open.last().map_or(self.doc.root(), |o| o.node)
    }

    fn append(&mut self, kind: NodeKind) -> NodeId {
        let parent = self.current();
        let id = self.doc.create_node(kind);
        self.doc.append_child(parent, id);
        id
    }

    /// Handles one event.
    pub(crate) fn event(&mut self, event: Event<'_>) -> Result<(), ParseError> {
        match event {
            Event::Decl(decl) => self.declaration(&decl),
            Event::DocType(text) => {
                let raw = utf8(&text).map(str::to_string);
                if let Some(raw) = self.checked(raw)? {
                    self.doctype(&raw)?;
                }
                Ok(())
            }
            Event::Start(start) => self.start(&start, false),
            Event::Empty(start) => self.start(&start, true),
            Event::End(end) => {
                let name = utf8(end.name().as_ref()).map(str::to_string);
                match self.checked(name)? {
                    Some(name) => self.end(&name),
                    None => Ok(()),
                }
            }
            Event::Text(text) => {
                let raw = utf8(&text).map(str::to_string);
                match self.checked(raw)? {
                    Some(raw) => self.text(&raw),
                    None => Ok(()),
                }
            }
            Event::CData(data) => {
                let content = utf8(&data).map(str::to_string);
                if let Some(content) = self.checked(content)? {
                    self.character_data(NodeKind::CData { content })?;
                }
                Ok(())
            }
            Event::Comment(text) => {
                let content = utf8(&text).map(str::to_string);
                if let Some(content) = self.checked(content)? {
                    self.append(NodeKind::Comment { content });
                }
                Ok(())
            }
            Event::GeneralRef(reference) => {
                let name = utf8(&reference).map(str::to_string);
                match self.checked(name)? {
                    Some(name) => self.reference(&name),
                    None => Ok(()),
                }
            }
            Event::PI(pi) => {
                let parts = utf8(pi.target()).and_then(|t| {
                    utf8(pi.content()).map(|d| (t.to_string(), d.trim_start().to_string()))
                });
                if let Some((target, data)) = self.checked(parts)? {
                    let data = (!data.is_empty()).then_some(data);
                    self.append(NodeKind::ProcessingInstruction { target, data });
                }
                Ok(())
            }
            Event::Eof => Ok(()),
        }
    }

    fn declaration(&mut self, decl: &BytesDecl<'_>) -> Result<(), ParseError> {
        if self.html() {
            return Ok(());
        }
        if let Ok(version) = decl.version() {
            self.doc.version = Some(String::from_utf8_lossy(&version).into_owned());
        }
        if let Some(Ok(encoding)) = decl.encoding() {
            self.doc.encoding = Some(String::from_utf8_lossy(&encoding).into_owned());
        }
        match decl.standalone() {
            Some(Ok(value)) if &*value == b"yes" => self.doc.standalone = Some(true),
            Some(Ok(value)) if &*value == b"no" => self.doc.standalone = Some(false),
            Some(_) => self.error("standalone accepts only 'yes' or 'no'")?,
            None => {}
        }
        Ok(())
    }

    fn doctype(&mut self, raw: &str) -> Result<(), ParseError> {
        if self.doc.doctype().is_some() {
            return self.error("more than one DOCTYPE declaration");
        }
        let Some(parsed) = parse_doctype(raw, self.html()) else {
            return self.error("malformed DOCTYPE declaration");
        };
        if self.options.substitute_entities {
            if let Some(subset) = &parsed.internal_subset {
                self.load_entities(subset);
            }
        }
        let parent = self.doc.root();
        let id = self.doc.create_node(NodeKind::DocumentType {
            name: parsed.name,
            system_id: parsed.system_id,
            public_id: parsed.public_id,
            internal_subset: parsed.internal_subset,
        });
        self.doc.append_child(parent, id);
        Ok(())
    }

    fn load_entities(&mut self, subset: &str) {
        let decls = match crate::dtd::parse::parse_internal_subset(subset) {
            Ok(decls) => decls,
            Err(err) => {
                warn!(error = %err, "internal subset not usable for entity substitution");
                return;
            }
        };
        let Some(dtd) = decls.root_element() else {
            return;
        };
        for node in decls.children(dtd) {
            if decls.node_name(node) != Some("internalEntityDecl") {
                continue;
            }
            if let (Some(name), Some(value)) = (decls.attribute(node, "name"), decls.attribute(node, "value")) {
                let value = entities::decode_flat(value, true, &|_| None).unwrap_or_default();
                self.entities.entry(name.to_string()).or_insert(value);
            }
        }
        debug!(count = self.entities.len(), "loaded internal entities");
    }

    fn resolve_entity(&self, name: &str) -> Option<String> {
        if self.html() {
            return crate::html::entity(name).map(str::to_string);
        }
        if self.options.substitute_entities {
            return self.entities.get(name).cloned();
        }
        None
    }

    fn start(&mut self, start: &BytesStart<'_>, empty: bool) -> Result<(), ParseError> {
        let html = self.html();
        let Some(raw_name) = self.checked(utf8(start.name().as_ref()).map(str::to_string))? else {
            return Ok(());
        };
        let qname = if html {
            raw_name.to_ascii_lowercase()
        } else {
            raw_name
        };

        let mut attrs: Vec<(String, String)> = Vec::new();
        let mut iter = if html {
            start.html_attributes()
        } else {
            start.attributes()
        };
        for attr in iter.with_checks(!html) {
            let attr = match attr {
                Ok(attr) => attr,
                Err(err) => {
                    self.error(err.to_string())?;
                    continue;
                }
            };
            let key = utf8(attr.key.as_ref()).map(str::to_string);
            let raw = utf8(&attr.value).map(str::to_string);
            let (Some(key), Some(raw)) = (self.checked(key)?, self.checked(raw)?) else {
                continue;
            };
            let key = if html { key.to_ascii_lowercase() } else { key };
            let value = entities::decode_flat(&raw, html, &|n| self.resolve_entity(n));
            let Some(value) = self.checked(value)? else {
                continue;
            };
            if html && attrs.iter().any(|(k, _)| *k == key) {
                continue;
            }
            attrs.push((key, value));
        }

        let bindings: Vec<(Option<String>, String)> = if html {
            Vec::new()
        } else {
            attrs
                .iter()
                .filter_map(|(k, v)| match k.as_str() {
                    "xmlns" => Some((None, v.clone())),
                    _ => k
                        .strip_prefix("xmlns:")
                        .map(|p| (Some(p.to_string()), v.clone())),
                })
                .collect()
        };

        let (prefix, local) = if html {
            (None, qname.as_str())
        } else {
            split_qname(&qname)
        };
        let namespace = self.lookup_namespace(prefix, &bindings);
        if let (Some(p), None) = (prefix, &namespace) {
            self.error(format!("namespace prefix {p} on {local} is not defined"))?;
        }

        if html {
            while self
                .open
                .last()
                .is_some_and(|o| crate::html::auto_closes(&o.qname, &qname))
            {
                self.open.pop();
            }
        }

        if self.open.is_empty() && self.doc.root_element().is_some() {
            self.error("extra content at the end of the document")?;
        }

        let element = self.append(NodeKind::Element {
            name: local.to_string(),
            prefix: prefix.map(str::to_string),
            namespace,
            attributes: Vec::new(),
        });

        for (key, value) in &attrs {
            let (attr_prefix, attr_local) = if html {
                (None, key.as_str())
            } else {
                split_qname(key)
            };
            let attr_ns = match attr_prefix {
                _ if key == "xmlns" || attr_prefix == Some("xmlns") => {
                    Some(XMLNS_NAMESPACE.to_string())
                }
                Some(p) => self.lookup_namespace(Some(p), &bindings),
                None => None,
            };
            self.doc
                .add_attribute(element, attr_local, attr_prefix, attr_ns.as_deref(), value);
        }

        let void = html && crate::html::is_void_element(&qname);
        if !empty && !void {
            self.open.push(Open {
                node: element,
                qname,
                bindings,
            });
        }
        Ok(())
    }

    fn lookup_namespace(
        &self,
        prefix: Option<&str>,
        pending: &[(Option<String>, String)],
    ) -> Option<String> {
        if prefix == Some("xml") {
            return Some(XML_NAMESPACE.to_string());
        }
        let scopes = std::iter::once(pending).chain(self.open.iter().rev().map(|o| o.bindings.as_slice()));
        for scope in scopes {
            if let Some((_, uri)) = scope.iter().rev().find(|(p, _)| p.as_deref() == prefix) {
                // xmlns="" undeclares the default namespace
                return (!uri.is_empty()).then(|| uri.clone());
            }
        }
        None
    }

    fn end(&mut self, raw_name: &str) -> Result<(), ParseError> {
        let name = if self.html() {
            raw_name.to_ascii_lowercase()
        } else {
            raw_name.to_string()
        };
        let Some(depth) = self.open.iter().rposition(|o| o.qname == name) else {
            if self.html() {
                trace!(tag = %name, "ignoring stray end tag");
                return Ok(());
            }
            return self.error(format!("unexpected end tag </{name}>"));
        };
        if depth + 1 != self.open.len() && !self.html() {
            let open = self.open.last().map(|o| o.qname.clone()).unwrap_or_default();
            self.error(format!(
                "opening and ending tag mismatch: {open} and {name}"
            ))?;
        }
        self.open.truncate(depth);
        Ok(())
    }

    fn text(&mut self, raw: &str) -> Result<(), ParseError> {
        let blank = raw.chars().all(|c| c.is_ascii_whitespace());
        if self.open.is_empty() {
            if !blank {
                self.error("content outside of the root element")?;
            }
            return Ok(());
        }
        if blank && self.options.no_blanks {
            return Ok(());
        }
        let html = self.html();
        let segments = entities::decode(raw, html, &|n| self.resolve_entity(n));
        let Some(segments) = self.checked(segments)? else {
            return Ok(());
        };
        for segment in segments {
            match segment {
                Segment::Text(content) => {
                    self.character_data(NodeKind::Text { content })?;
                }
                Segment::Ref(name) => {
                    self.append(NodeKind::EntityRef { name });
                }
            }
        }
        Ok(())
    }

    /// Handles a general reference that appeared in character data.
    fn reference(&mut self, body: &str) -> Result<(), ParseError> {
        if self.open.is_empty() {
            return self.error("entity reference outside of the root element");
        }
        let decoded = if let Some(num) = body.strip_prefix('#') {
            entities::char_ref(num).map(String::from)
        } else if let Some(value) = entities::predefined(body) {
            Some(value.to_string())
        } else {
            self.resolve_entity(body)
        };
        match decoded {
            Some(content) => self.character_data(NodeKind::Text { content }),
            None if self.html() => self.character_data(NodeKind::Text {
                content: format!("&{body};"),
            }),
            None if body.starts_with('#') => {
                self.error(format!("invalid character reference &{body};"))
            }
            None => {
                self.append(NodeKind::EntityRef {
                    name: body.to_string(),
                });
                Ok(())
            }
        }
    }

    fn character_data(&mut self, kind: NodeKind) -> Result<(), ParseError> {
        if self.open.is_empty() {
            return self.error("character data outside of the root element");
        }
        // text runs split around references are merged into one node
        if let (NodeKind::Text { content }, Some(last)) = (&kind, self.doc.last_child(self.current())) {
            if let NodeKind::Text { content: existing } = &self.doc.node(last).kind {
                let merged = format!("{existing}{content}");
                self.doc.set_text(last, merged);
                return Ok(());
            }
        }
        self.append(kind);
        Ok(())
    }

    /// Closes the parse and hands out the finished tree.
    pub(crate) fn finish(mut self) -> Result<Document, ParseError> {
        if let Some(open) = self.open.last() {
            if !self.html() {
                let name = open.qname.clone();
                self.error(format!("premature end of data in tag {name}"))?;
            }
        }
        self.open.clear();
        if self.doc.root_element().is_none() && !self.html() {
            self.error("document is empty")?;
        }
        debug!(
            nodes = self.doc.node_count(),
            diagnostics = self.doc.diagnostics.len(),
            "parse finished"
        );
        Ok(self.doc)
    }
}

/// The pieces of a DOCTYPE declaration.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Doctype {
    pub(crate) name: String,
    pub(crate) public_id: Option<String>,
    pub(crate) system_id: Option<String>,
    pub(crate) internal_subset: Option<String>,
}

/// Splits the body of `<!DOCTYPE ...>` into name, external ids and the raw
/// internal subset.
pub(crate) fn parse_doctype(raw: &str, html: bool) -> Option<Doctype> {
    let raw = raw.trim_start();
    let raw = strip_keyword(raw, "DOCTYPE").unwrap_or(raw).trim_start();
    let name_end = raw
        .find(|c: char| c.is_ascii_whitespace() || c == '[' || c == '>')
        .unwrap_or(raw.len());
    if name_end == 0 {
        return None;
    }
    let mut name = raw[..name_end].to_string();
    if html {
        name.make_ascii_lowercase();
    }
    let mut rest = raw[name_end..].trim_start();
    let mut doctype = Doctype {
        name,
        ..Doctype::default()
    };

    if let Some(after) = strip_keyword(rest, "PUBLIC") {
        let (public_id, after) = quoted(after.trim_start())?;
        doctype.public_id = Some(public_id.to_string());
        rest = after.trim_start();
        if let Some((system_id, after)) = quoted(rest) {
            doctype.system_id = Some(system_id.to_string());
            rest = after.trim_start();
        }
    } else if let Some(after) = strip_keyword(rest, "SYSTEM") {
        let (system_id, after) = quoted(after.trim_start())?;
        doctype.system_id = Some(system_id.to_string());
        rest = after.trim_start();
    }

    if let Some(subset) = rest.strip_prefix('[') {
        let close = subset.rfind(']')?;
        doctype.internal_subset = Some(subset[..close].to_string());
    }
    Some(doctype)
}

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let head = text.get(..keyword.len())?;
    head.eq_ignore_ascii_case(keyword)
        .then(|| &text[keyword.len()..])
}

fn quoted(text: &str) -> Option<(&str, &str)> {
    let quote = text.chars().next().filter(|&c| c == '"' || c == '\'')?;
    let body = &text[1..];
    let close = body.find(quote)?;
    Some((&body[..close], &body[close + 1..]))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_doctype_public() {
        let dt = parse_doctype(
            r#" html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd""#,
            false,
        )
        .unwrap();
        assert_eq!(dt.name, "html");
        assert_eq!(dt.public_id.as_deref(), Some("-//W3C//DTD XHTML 1.0 Strict//EN"));
        assert_eq!(
            dt.system_id.as_deref(),
            Some("http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd")
        );
        assert_eq!(dt.internal_subset, None);
    }

    #[test]
    fn test_parse_doctype_system_with_subset() {
        let dt = parse_doctype(" doc SYSTEM 'doc.dtd' [<!ELEMENT doc ANY>]", false).unwrap();
        assert_eq!(dt.name, "doc");
        assert_eq!(dt.public_id, None);
        assert_eq!(dt.system_id.as_deref(), Some("doc.dtd"));
        assert_eq!(dt.internal_subset.as_deref(), Some("<!ELEMENT doc ANY>"));
    }

    #[test]
    fn test_parse_doctype_subset_only() {
        let dt = parse_doctype("r[<!ENTITY e 'v'>]", false).unwrap();
        assert_eq!(dt.name, "r");
        assert_eq!(dt.internal_subset.as_deref(), Some("<!ENTITY e 'v'>"));
    }

    #[test]
    fn test_parse_doctype_html_lowercases() {
        let dt = parse_doctype(" HTML", true).unwrap();
        assert_eq!(dt.name, "html");
    }

    #[test]
    fn test_parse_doctype_rejects_empty() {
        assert!(parse_doctype("   ", false).is_none());
        assert!(parse_doctype(" r PUBLIC", false).is_none());
    }
}
