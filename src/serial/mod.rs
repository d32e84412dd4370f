//! XML and HTML serialization.
//!
//! Both dialects write into a [`SaveContext`] created per call. The XML
//! dialect emits a prolog and the root element; the HTML dialect emits the
//! document type and every top-level node. [`SaveOptions`] selects the
//! dialect, pretty-printing, the empty-tag style and the declared encoding.
//!
//! Text, CDATA and attribute values share one escaping rule: `&`, `<`, `>`
//! and carriage return are replaced by `&amp;`, `&lt;`, `&gt;` and `&#13;`.
//! Quotes are left alone.

pub mod html;
pub mod xml;

use tracing::debug;

use crate::cache::{IdentityCache, Node, NodeVariant};
use crate::error::{Error, Result};
use crate::tree::{Document, NodeId, NodeKind};

/// Indentation added per nesting level when formatting.
const INDENT: &str = "  ";

/// Options controlling serialization output.
///
/// ```
/// use xmlfacade::serial::SaveOptions;
///
/// let opts = SaveOptions::default().format(true).no_declaration(true);
/// assert!(opts.format);
/// assert_eq!(SaveOptions::from_bits(1 | 2), opts);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Put child elements on their own indented lines.
    pub format: bool,
    /// Omit the `<?xml ...?>` prolog.
    pub no_declaration: bool,
    /// Write `<a></a>` instead of `<a/>`.
    pub no_empty_tags: bool,
    /// `Some(true)` forces HTML output, `Some(false)` forces XML; `None`
    /// follows the document.
    pub html: Option<bool>,
    /// Encoding named in the prolog, overriding the document's own.
    pub encoding: Option<String>,
}

impl SaveOptions {
    pub const FORMAT: u32 = 1;
    pub const NO_DECLARATION: u32 = 2;
    pub const NO_EMPTY_TAGS: u32 = 4;
    pub const NO_XHTML: u32 = 8;
    pub const AS_XHTML: u32 = 16;
    pub const AS_XML: u32 = 32;
    pub const AS_HTML: u32 = 64;

    /// Builds options from the classic bit flags. XHTML bits and unknown
    /// bits are ignored; `AS_HTML` wins over `AS_XML`.
    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        let html = if bits & Self::AS_HTML != 0 {
            Some(true)
        } else if bits & Self::AS_XML != 0 {
            Some(false)
        } else {
            None
        };
        Self {
            format: bits & Self::FORMAT != 0,
            no_declaration: bits & Self::NO_DECLARATION != 0,
            no_empty_tags: bits & Self::NO_EMPTY_TAGS != 0,
            html,
            encoding: None,
        }
    }

    /// Enables or disables pretty-printing.
    #[must_use]
    pub fn format(mut self, yes: bool) -> Self {
        self.format = yes;
        self
    }

    /// Enables or disables the XML prolog.
    #[must_use]
    pub fn no_declaration(mut self, yes: bool) -> Self {
        self.no_declaration = yes;
        self
    }

    /// Enables or disables explicit end tags for empty elements.
    #[must_use]
    pub fn no_empty_tags(mut self, yes: bool) -> Self {
        self.no_empty_tags = yes;
        self
    }

    /// Forces the HTML (`true`) or XML (`false`) dialect.
    #[must_use]
    pub fn html(mut self, yes: bool) -> Self {
        self.html = Some(yes);
        self
    }

    /// Sets the encoding named in the prolog.
    #[must_use]
    pub fn encoding(mut self, label: &str) -> Self {
        self.encoding = Some(label.to_string());
        self
    }
}

/// Output state of one serialize call.
#[derive(Debug)]
pub struct SaveContext {
    out: String,
    level: usize,
    format: bool,
    no_declaration: bool,
    no_empty_tags: bool,
    html: bool,
    encoding: Option<String>,
}

impl SaveContext {
    /// Creates a context for `options`, resolving the dialect against
    /// `html_document`.
    #[must_use]
    pub fn new(options: &SaveOptions, html_document: bool) -> Self {
        Self {
            out: String::new(),
            level: 0,
            format: options.format,
            no_declaration: options.no_declaration,
            no_empty_tags: options.no_empty_tags,
            html: options.html.unwrap_or(html_document),
            encoding: options.encoding.clone(),
        }
    }

    #[must_use]
    pub fn format(&self) -> bool {
        self.format
    }

    pub fn set_format(&mut self, yes: bool) {
        self.format = yes;
    }

    #[must_use]
    pub fn no_declaration(&self) -> bool {
        self.no_declaration
    }

    #[must_use]
    pub fn no_empty_tags(&self) -> bool {
        self.no_empty_tags
    }

    #[must_use]
    pub fn html(&self) -> bool {
        self.html
    }

    /// The explicit encoding override, if any.
    #[must_use]
    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn append(&mut self, s: &str) {
        self.out.push_str(s);
    }

    /// Appends `s` in double quotes, unescaped.
    pub fn append_quoted(&mut self, s: &str) {
        self.out.push('"');
        self.out.push_str(s);
        self.out.push('"');
    }

    /// Appends `s` with markup characters escaped.
    pub fn append_escaped(&mut self, s: &str) {
        escape_into(&mut self.out, s);
    }

    pub fn increase_level(&mut self) {
        self.level += 1;
    }

    pub fn decrease_level(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    /// Appends the indentation of the current level.
    pub fn indent(&mut self) {
        for _ in 0..self.level {
            self.out.push_str(INDENT);
        }
    }

    /// Consumes the context and returns the output.
    #[must_use]
    pub fn finish(self) -> String {
        self.out
    }
}

/// Escapes `&`, `<`, `>` and carriage return; quotes pass through.
///
/// ```
/// assert_eq!(xmlfacade::serial::escape("a<b & \"c\"\r"), "a&lt;b &amp; \"c\"&#13;");
/// ```
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_into(&mut out, text);
    out
}

fn escape_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
}

/// A tree together with the identity cache its wrappers come from.
///
/// The dialect writers walk wrapped nodes: every node is resolved through
/// `cache` before it is written, so serializing observes the same wrappers
/// as every other route into the document.
#[derive(Debug, Clone, Copy)]
pub struct Source<'a> {
    doc: &'a Document,
    cache: &'a IdentityCache,
}

impl<'a> Source<'a> {
    #[must_use]
    pub fn new(doc: &'a Document, cache: &'a IdentityCache) -> Self {
        Self { doc, cache }
    }

    #[must_use]
    pub fn doc(&self) -> &'a Document {
        self.doc
    }

    /// The wrapper of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownNodeKind`] if `id` is not a node of the tree.
    pub fn wrap(&self, id: NodeId) -> Result<Node> {
        self.cache
            .resolve(self.doc, Some(id))?
            .ok_or(Error::UnknownNodeKind(id.into_raw()))
    }

    /// Wrappers of the children of `node`, in order.
    ///
    /// # Errors
    ///
    /// See [`wrap`](Self::wrap).
    pub fn children(&self, node: &Node) -> Result<Vec<Node>> {
        self.doc.children(node.id()).map(|id| self.wrap(id)).collect()
    }

    /// Wrappers of the attributes of `node`, in order.
    ///
    /// # Errors
    ///
    /// See [`wrap`](Self::wrap).
    pub fn attributes(&self, node: &Node) -> Result<Vec<Node>> {
        self.doc
            .attributes(node.id())
            .iter()
            .map(|&id| self.wrap(id))
            .collect()
    }

    /// `prefix:name` of an element or attribute, the target of a PI.
    #[must_use]
    pub fn name(&self, node: &Node) -> String {
        self.doc.qualified_name(node.id()).unwrap_or_default()
    }

    /// Character data, attribute value or PI data of `node`.
    #[must_use]
    pub fn text(&self, node: &Node) -> &'a str {
        self.doc.node_text(node.id()).unwrap_or_default()
    }
}

/// Writes `<!DOCTYPE name PUBLIC "p" "s">` or the `SYSTEM` form, with the
/// internal subset in brackets when `subset` is set.
pub(crate) fn save_doctype(src: Source<'_>, node: &Node, subset: bool, ctx: &mut SaveContext) {
    let NodeKind::DocumentType {
        name,
        system_id,
        public_id,
        internal_subset,
    } = &src.doc().node(node.id()).kind
    else {
        return;
    };
    ctx.append("<!DOCTYPE ");
    ctx.append(name);
    match (public_id, system_id) {
        (Some(public_id), system_id) => {
            ctx.append(" PUBLIC ");
            ctx.append_quoted(public_id);
            if let Some(system_id) = system_id {
                ctx.append(" ");
                ctx.append_quoted(system_id);
            }
        }
        (None, Some(system_id)) => {
            ctx.append(" SYSTEM ");
            ctx.append_quoted(system_id);
        }
        (None, None) => {}
    }
    if let (true, Some(internal_subset)) = (subset, internal_subset) {
        ctx.append(" [");
        ctx.append(internal_subset);
        ctx.append("]");
    }
    ctx.append(">");
}

/// Serializes a whole document.
///
/// Wrappers are created in a cache private to this call; use
/// [`serialize_with_cache`] to share one.
///
/// # Errors
///
/// Returns [`Error::MissingRoot`] when writing XML for a document without a
/// root element.
pub fn serialize_document(doc: &Document, options: &SaveOptions) -> Result<String> {
    serialize_node(doc, doc.root(), options)
}

/// Serializes `node` and its subtree.
///
/// The document node serializes as a whole document; any other node is
/// written on its own with no prolog.
///
/// # Errors
///
/// Returns [`Error::UnknownNodeKind`] if `node` is not part of `doc`, and
/// [`Error::MissingRoot`] as for [`serialize_document`].
pub fn serialize_node(doc: &Document, node: NodeId, options: &SaveOptions) -> Result<String> {
    serialize_with_cache(doc, &IdentityCache::new(), node, options)
}

/// Serializes `node` and its subtree, resolving every node it writes
/// through `cache`.
///
/// # Errors
///
/// As for [`serialize_node`].
pub fn serialize_with_cache(
    doc: &Document,
    cache: &IdentityCache,
    node: NodeId,
    options: &SaveOptions,
) -> Result<String> {
    let src = Source::new(doc, cache);
    let node = src.wrap(node)?;
    let mut ctx = SaveContext::new(options, doc.html);
    debug!(
        node = node.id().into_raw(),
        html = ctx.html(),
        format = ctx.format(),
        "serializing"
    );
    match (ctx.html(), node.variant()) {
        (false, NodeVariant::Document) => xml::save_document(src, &mut ctx)?,
        (false, _) => xml::save_node(src, &node, &mut ctx)?,
        (true, NodeVariant::Document) => html::save_document(src, &mut ctx)?,
        (true, _) => html::save_node(src, &node, &mut ctx)?,
    }
    Ok(ctx.finish())
}
