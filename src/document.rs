//! The wrapped document.
//!
//! [`XmlDocument`] owns a parsed tree together with its identity cache and
//! hands out [`Node`] wrappers for navigation, path computation and
//! serialization. The tree is never mutated after wrapping, so wrappers stay
//! valid for the document's whole lifetime.
//!
//! ```
//! use xmlfacade::XmlDocument;
//!
//! let doc = XmlDocument::parse("<root><item/><item/></root>").unwrap();
//! let root = doc.root().unwrap().unwrap();
//! let items = doc.children(&root).unwrap();
//! assert_eq!(doc.path(&items[1]).unwrap(), "/root/item[2]");
//! assert_eq!(doc.parent(&items[0]).unwrap(), Some(root));
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::cache::{DtdState, IdentityCache, Node};
use crate::dtd::{AttributeDecl, Declaration, Declarations, ElementDecl, EntityDecl, NotationDecl};
use crate::error::{Error, Result};
use crate::parser::{parse_str_with_options, ParseOptions};
use crate::serial::{self, SaveOptions};
use crate::tree::{Document, NodeId, NodeKind};

/// A parsed document with identity-stable node wrappers.
#[derive(Debug)]
pub struct XmlDocument {
    tree: Document,
    cache: IdentityCache,
    encoding: Option<String>,
}

impl XmlDocument {
    /// Wraps an already built tree.
    #[must_use]
    pub fn new(tree: Document) -> Self {
        Self {
            tree,
            cache: IdentityCache::new(),
            encoding: None,
        }
    }

    /// Parses XML with default options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the input is not well-formed.
    pub fn parse(input: &str) -> Result<Self> {
        Self::parse_with_options(input, &ParseOptions::default())
    }

    /// Parses with explicit options; `options.html` selects the HTML rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the input cannot be parsed.
    pub fn parse_with_options(input: &str, options: &ParseOptions) -> Result<Self> {
        Ok(Self::new(parse_str_with_options(input, options)?))
    }

    /// Parses HTML with default options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the input cannot be parsed.
    pub fn parse_html(input: &str) -> Result<Self> {
        Ok(Self::new(crate::html::parse_html(input)?))
    }

    /// The underlying tree.
    #[must_use]
    pub fn tree(&self) -> &Document {
        &self.tree
    }

    /// The identity cache.
    #[must_use]
    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    /// Unwraps the tree, dropping every wrapper.
    #[must_use]
    pub fn into_tree(self) -> Document {
        self.tree
    }

    /// True if the tree came from the HTML parser.
    #[must_use]
    pub fn is_html(&self) -> bool {
        self.tree.html
    }

    // --- Identity ---

    /// Returns the wrapper for `id`; `None` passes through.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownNodeKind`] if `id` is not a node of this
    /// document.
    pub fn resolve(&self, id: Option<NodeId>) -> Result<Option<Node>> {
        self.cache.resolve(&self.tree, id)
    }

    fn wrap(&self, id: NodeId) -> Result<Node> {
        self.resolve(Some(id))?
            .ok_or(Error::UnknownNodeKind(id.into_raw()))
    }

    /// Checks that `node` was handed out by this document.
    fn check(&self, node: &Node) -> Result<NodeId> {
        match self.cache.get(node.id()) {
            Some(known) if known.ptr_eq(node) => Ok(node.id()),
            _ => Err(Error::UnknownNodeKind(node.id().into_raw())),
        }
    }

    // --- Navigation ---

    /// The document node.
    ///
    /// # Errors
    ///
    /// Never fails for a well-formed arena; the `Result` mirrors
    /// [`resolve`](Self::resolve).
    pub fn document_node(&self) -> Result<Node> {
        self.wrap(self.tree.root())
    }

    /// The root element, if the document has one.
    ///
    /// # Errors
    ///
    /// See [`resolve`](Self::resolve).
    pub fn root(&self) -> Result<Option<Node>> {
        self.resolve(self.tree.root_element())
    }

    /// The child nodes of `node`, in order. Attributes are not children.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownNodeKind`] for a node of another document.
    pub fn children(&self, node: &Node) -> Result<Vec<Node>> {
        let id = self.check(node)?;
        self.tree.children(id).map(|child| self.wrap(child)).collect()
    }

    /// The parent of `node`; for attributes, the owning element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownNodeKind`] for a node of another document.
    pub fn parent(&self, node: &Node) -> Result<Option<Node>> {
        let id = self.check(node)?;
        self.resolve(self.tree.parent(id))
    }

    /// # Errors
    ///
    /// Returns [`Error::UnknownNodeKind`] for a node of another document.
    pub fn next_sibling(&self, node: &Node) -> Result<Option<Node>> {
        let id = self.check(node)?;
        self.resolve(self.tree.next_sibling(id))
    }

    /// # Errors
    ///
    /// Returns [`Error::UnknownNodeKind`] for a node of another document.
    pub fn previous_sibling(&self, node: &Node) -> Result<Option<Node>> {
        let id = self.check(node)?;
        self.resolve(self.tree.prev_sibling(id))
    }

    /// The attribute nodes of an element; empty for other kinds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownNodeKind`] for a node of another document.
    pub fn attribute_nodes(&self, node: &Node) -> Result<Vec<Node>> {
        let id = self.check(node)?;
        self.tree
            .attributes(id)
            .iter()
            .map(|&attr| self.wrap(attr))
            .collect()
    }

    /// The value of the attribute with qualified name `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownNodeKind`] for a node of another document.
    pub fn attribute(&self, node: &Node, name: &str) -> Result<Option<&str>> {
        let id = self.check(node)?;
        Ok(self.tree.attribute(id, name))
    }

    /// # Errors
    ///
    /// Returns [`Error::UnknownNodeKind`] for a node of another document.
    pub fn has_attribute(&self, node: &Node, name: &str) -> Result<bool> {
        Ok(self.attribute(node, name)?.is_some())
    }

    /// The node name: the qualified name of elements and attributes, the
    /// target of processing instructions, `#text`, `#comment` and so on for
    /// the unnamed kinds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownNodeKind`] for a node of another document.
    pub fn name(&self, node: &Node) -> Result<String> {
        let id = self.check(node)?;
        let name = match &self.tree.node(id).kind {
            NodeKind::Document => "#document".to_string(),
            NodeKind::Text { .. } => "#text".to_string(),
            NodeKind::CData { .. } => "#cdata-section".to_string(),
            NodeKind::Comment { .. } => "#comment".to_string(),
            _ => self.tree.qualified_name(id).unwrap_or_default(),
        };
        Ok(name)
    }

    /// The text content of `node` and its descendants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownNodeKind`] for a node of another document.
    pub fn content(&self, node: &Node) -> Result<String> {
        let id = self.check(node)?;
        let content = match &self.tree.node(id).kind {
            NodeKind::Comment { content } => content.clone(),
            NodeKind::ProcessingInstruction { data, .. } => data.clone().unwrap_or_default(),
            _ => self.tree.text_content(id),
        };
        Ok(content)
    }

    /// The positional path of `node`, e.g. `/root/child[2]/@id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownNodeKind`] for a node of another document.
    pub fn path(&self, node: &Node) -> Result<String> {
        let id = self.check(node)?;
        crate::path::path_of(&self.tree, id)
    }

    // --- DTD ---

    /// The document type declaration, if the document has one.
    ///
    /// # Errors
    ///
    /// See [`resolve`](Self::resolve).
    pub fn internal_subset(&self) -> Result<Option<Dtd<'_>>> {
        let Some(node) = self.resolve(self.tree.doctype())? else {
            return Ok(None);
        };
        Ok(self.dtd(&node))
    }

    /// Views a DTD wrapper of this document; `None` for other kinds.
    #[must_use]
    pub fn dtd(&self, node: &Node) -> Option<Dtd<'_>> {
        let state = Arc::clone(node.as_dtd()?);
        self.check(node).ok()?;
        Some(Dtd {
            doc: self,
            node: node.clone(),
            state,
        })
    }

    // --- Serialization ---

    /// Serializes the whole document with default options, in the dialect
    /// the document was parsed with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingRoot`] if an XML document has no root.
    pub fn serialize(&self) -> Result<String> {
        self.serialize_with_options(&SaveOptions::default())
    }

    /// Serializes the whole document. The encoding set with
    /// [`set_encoding`](Self::set_encoding) is used unless `options` names
    /// one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingRoot`] if an XML document has no root.
    pub fn serialize_with_options(&self, options: &SaveOptions) -> Result<String> {
        let root = self.tree.root();
        serial::serialize_with_cache(&self.tree, &self.cache, root, &self.save_options(options))
    }

    /// Serializes a single node and its subtree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownNodeKind`] for a node of another document, or
    /// [`Error::MissingRoot`] for a rootless document node.
    pub fn serialize_node(&self, node: &Node, options: &SaveOptions) -> Result<String> {
        let id = self.check(node)?;
        serial::serialize_with_cache(&self.tree, &self.cache, id, &self.save_options(options))
    }

    /// Serializes the whole document and encodes it in the resolved
    /// encoding, UTF-8 when none is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if the encoding is unknown or cannot
    /// represent the output, otherwise as
    /// [`serialize_with_options`](Self::serialize_with_options).
    pub fn serialize_to_bytes(&self, options: &SaveOptions) -> Result<Vec<u8>> {
        let options = self.save_options(options);
        let text = serial::serialize_with_cache(&self.tree, &self.cache, self.tree.root(), &options)?;
        let label = options
            .encoding
            .as_deref()
            .or_else(|| self.encoding())
            .unwrap_or("UTF-8");
        debug!(encoding = label, bytes = text.len(), "encoding output");
        Ok(crate::encoding::encode(&text, label)?)
    }

    fn save_options(&self, options: &SaveOptions) -> SaveOptions {
        let mut options = options.clone();
        if options.encoding.is_none() {
            options.encoding.clone_from(&self.encoding);
        }
        options
    }

    /// The explicit encoding if one was set, else the declared one.
    #[must_use]
    pub fn encoding(&self) -> Option<&str> {
        self.encoding
            .as_deref()
            .or(self.tree.encoding.as_deref())
            .filter(|e| !e.is_empty())
    }

    /// Overrides the encoding used for output; `None` restores the
    /// declared encoding.
    pub fn set_encoding(&mut self, encoding: Option<&str>) {
        self.encoding = encoding.map(str::to_string);
    }
}

impl From<Document> for XmlDocument {
    fn from(tree: Document) -> Self {
        Self::new(tree)
    }
}

/// A document type declaration and its lazily extracted declarations.
///
/// Every accessor triggers extraction on first use; the result is cached on
/// the DTD wrapper, so repeated calls return the same collections.
#[derive(Debug, Clone)]
pub struct Dtd<'a> {
    doc: &'a XmlDocument,
    node: Node,
    state: Arc<DtdState>,
}

impl<'a> Dtd<'a> {
    /// The wrapper this view is over.
    #[must_use]
    pub fn node(&self) -> &Node {
        &self.node
    }

    fn fields(&self) -> (&'a str, Option<&'a str>, Option<&'a str>, Option<&'a str>) {
        let doc: &'a XmlDocument = self.doc;
        match &doc.tree.node(self.node.id()).kind {
            NodeKind::DocumentType {
                name,
                system_id,
                public_id,
                internal_subset,
            } => (
                name,
                system_id.as_deref(),
                public_id.as_deref(),
                internal_subset.as_deref(),
            ),
            _ => ("", None, None, None),
        }
    }

    /// The declared root element name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.fields().0
    }

    #[must_use]
    pub fn system_id(&self) -> Option<&'a str> {
        self.fields().1
    }

    /// The public identifier.
    #[must_use]
    pub fn external_id(&self) -> Option<&'a str> {
        self.fields().2
    }

    /// The raw text of the internal subset.
    #[must_use]
    pub fn subset_text(&self) -> Option<&'a str> {
        self.fields().3
    }

    /// All extracted declarations.
    #[must_use]
    pub fn declarations(&self) -> &Arc<Declarations> {
        self.state.declarations_with(|| {
            debug!(node = self.node.id().into_raw(), "extracting declarations");
            Declarations::from_internal_subset(self.subset_text())
        })
    }

    #[must_use]
    pub fn elements(&self) -> &IndexMap<String, Arc<ElementDecl>> {
        self.declarations().elements()
    }

    #[must_use]
    pub fn attributes(&self) -> &IndexMap<String, Arc<AttributeDecl>> {
        self.declarations().attributes()
    }

    #[must_use]
    pub fn entities(&self) -> &IndexMap<String, Arc<EntityDecl>> {
        self.declarations().entities()
    }

    #[must_use]
    pub fn notations(&self) -> &IndexMap<String, Arc<NotationDecl>> {
        self.declarations().notations()
    }

    /// Every declaration in document order.
    #[must_use]
    pub fn children(&self) -> &[Declaration] {
        self.declarations().all()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_navigation_round_trip() {
        let doc = XmlDocument::parse("<r><a/>t<b x='1'/></r>").unwrap();
        let r = doc.root().unwrap().unwrap();
        let kids = doc.children(&r).unwrap();
        assert_eq!(kids.len(), 3);
        assert_eq!(doc.next_sibling(&kids[0]).unwrap(), Some(kids[1].clone()));
        assert_eq!(doc.previous_sibling(&kids[2]).unwrap(), Some(kids[1].clone()));
        assert_eq!(doc.previous_sibling(&kids[0]).unwrap(), None);
        assert_eq!(doc.parent(&kids[2]).unwrap(), Some(r.clone()));

        let doc_node = doc.document_node().unwrap();
        assert_eq!(doc.parent(&r).unwrap(), Some(doc_node.clone()));
        assert_eq!(doc.parent(&doc_node).unwrap(), None);
    }

    #[test]
    fn test_attributes() {
        let doc = XmlDocument::parse("<r a='1' b='2'/>").unwrap();
        let r = doc.root().unwrap().unwrap();
        let attrs = doc.attribute_nodes(&r).unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(doc.name(&attrs[1]).unwrap(), "b");
        assert_eq!(doc.content(&attrs[1]).unwrap(), "2");
        assert_eq!(doc.parent(&attrs[0]).unwrap(), Some(r.clone()));
        assert_eq!(doc.attribute(&r, "a").unwrap(), Some("1"));
        assert!(doc.has_attribute(&r, "b").unwrap());
        assert!(!doc.has_attribute(&r, "c").unwrap());
        assert_eq!(doc.attribute_nodes(&r).unwrap(), attrs);
    }

    #[test]
    fn test_names_and_content() {
        let doc = XmlDocument::parse("<p:r xmlns:p='urn:p'>x<!--c--><?t d?></p:r>").unwrap();
        let r = doc.root().unwrap().unwrap();
        assert_eq!(doc.name(&r).unwrap(), "p:r");
        let kids = doc.children(&r).unwrap();
        let names: Vec<_> = kids.iter().map(|k| doc.name(k).unwrap()).collect();
        assert_eq!(names, vec!["#text", "#comment", "t"]);
        assert_eq!(doc.content(&kids[1]).unwrap(), "c");
        assert_eq!(doc.content(&kids[2]).unwrap(), "d");
        assert_eq!(doc.content(&r).unwrap(), "x");
        assert_eq!(doc.name(&doc.document_node().unwrap()).unwrap(), "#document");
    }

    #[test]
    fn test_foreign_node_rejected() {
        let one = XmlDocument::parse("<r/>").unwrap();
        let two = XmlDocument::parse("<r/>").unwrap();
        let r = one.root().unwrap().unwrap();
        assert!(matches!(two.children(&r), Err(Error::UnknownNodeKind(_))));
        assert!(two.dtd(&r).is_none());
    }

    #[test]
    fn test_internal_subset_memoized() {
        let doc = XmlDocument::parse(
            "<!DOCTYPE r PUBLIC 'pub' 'sys' [<!ELEMENT r (a)*><!ELEMENT a EMPTY><!ATTLIST a k CDATA #IMPLIED>]><r/>",
        )
        .unwrap();
        let dtd = doc.internal_subset().unwrap().unwrap();
        assert_eq!(dtd.name(), "r");
        assert_eq!(dtd.external_id(), Some("pub"));
        assert_eq!(dtd.system_id(), Some("sys"));
        assert_eq!(dtd.elements().len(), 2);
        assert_eq!(dtd.children().len(), 3);

        let again = doc.internal_subset().unwrap().unwrap();
        assert!(Arc::ptr_eq(dtd.declarations(), again.declarations()));
        assert_eq!(dtd.node(), again.node());
    }

    #[test]
    fn test_no_doctype() {
        let doc = XmlDocument::parse("<r/>").unwrap();
        assert!(doc.internal_subset().unwrap().is_none());
    }

    #[test]
    fn test_encoding_override() {
        let mut doc =
            XmlDocument::parse("<?xml version='1.0' encoding='ISO-8859-1'?><r>\u{e9}</r>").unwrap();
        assert_eq!(doc.encoding(), Some("ISO-8859-1"));
        let bytes = doc.serialize_to_bytes(&SaveOptions::default()).unwrap();
        assert!(bytes.ends_with(b"<r>\xe9</r>\n"));

        doc.set_encoding(Some("UTF-8"));
        assert_eq!(doc.encoding(), Some("UTF-8"));
        let out = doc.serialize().unwrap();
        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\""));
        doc.set_encoding(None);
        assert_eq!(doc.encoding(), Some("ISO-8859-1"));
    }

    #[test]
    fn test_unknown_encoding() {
        let doc = XmlDocument::parse("<r/>").unwrap();
        let err = doc
            .serialize_to_bytes(&SaveOptions::default().encoding("no-such-charset"))
            .unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
    }

    #[test]
    fn test_html_document_serializes_as_html() {
        let doc = XmlDocument::parse_html("<p>a<br>b</p>").unwrap();
        assert!(doc.is_html());
        assert_eq!(doc.serialize().unwrap(), "<p>a<br></br>b</p>\n");
    }

    #[test]
    fn test_serialize_node() {
        let doc = XmlDocument::parse("<r><a>t</a></r>").unwrap();
        let r = doc.root().unwrap().unwrap();
        let a = &doc.children(&r).unwrap()[0];
        assert_eq!(doc.serialize_node(a, &SaveOptions::default()).unwrap(), "<a>t</a>");
    }

    #[test]
    fn test_missing_root() {
        let doc = XmlDocument::new(Document::new());
        assert!(doc.root().unwrap().is_none());
        assert!(matches!(doc.serialize(), Err(Error::MissingRoot)));
    }
}
