//! Node type definitions.
//!
//! The `NodeKind` enum represents every node type a parser adapter can hand
//! to the rest of the crate. Each variant carries the node-type-specific
//! payload (element name and attribute list, text content, doctype ids).

use super::NodeId;

/// The kind of a tree node and its associated data.
///
/// This enum carries the payload for each node type. Navigation links
/// (parent, children, siblings) are stored in `NodeData`, not here.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// The document node. There is exactly one per `Document`.
    Document,

    /// An element node, e.g., `<div class="x">`.
    Element {
        /// The element's local name.
        name: String,
        /// Namespace prefix (e.g., `"svg"` in `svg:rect`), if any.
        prefix: Option<String>,
        /// Namespace URI after resolution, if any.
        namespace: Option<String>,
        /// Attribute nodes owned by this element, in document order.
        attributes: Vec<NodeId>,
    },

    /// An attribute node. Its parent is the owning element, but it is never
    /// part of that element's child list.
    Attribute {
        /// The attribute's local name (`"lang"` for `xml:lang`).
        name: String,
        /// Namespace prefix, if any.
        prefix: Option<String>,
        /// Namespace URI after resolution, if any.
        namespace: Option<String>,
        /// The attribute value with references already decoded.
        value: String,
    },

    /// A text node containing character data.
    Text {
        /// The text content (character references resolved).
        content: String,
    },

    /// A CDATA section, e.g., `<![CDATA[...]]>`.
    CData {
        /// The CDATA content.
        content: String,
    },

    /// A comment node, e.g., `<!-- ... -->`.
    Comment {
        /// The comment text (without the `<!--` and `-->` delimiters).
        content: String,
    },

    /// A processing instruction, e.g., `<?target data?>`.
    ProcessingInstruction {
        /// The PI target (e.g., `"xml-stylesheet"`).
        target: String,
        /// The PI data, if any.
        data: Option<String>,
    },

    /// An entity reference node (e.g., `&copy;` when not substituted).
    EntityRef {
        /// The entity name (without `&` and `;`).
        name: String,
    },

    /// A document type declaration node, e.g., `<!DOCTYPE html>`.
    DocumentType {
        /// The root element name declared in the DOCTYPE.
        name: String,
        /// The SYSTEM identifier (URI), if any.
        system_id: Option<String>,
        /// The PUBLIC identifier, if any.
        public_id: Option<String>,
        /// The raw internal subset (text between `[` and `]`), if any.
        internal_subset: Option<String>,
    },
}

/// The payload-free tag of a [`NodeKind`].
///
/// Used wherever only the node type matters: wrapper dispatch, sibling
/// counting in paths, and the mixed-content check in the serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// [`NodeKind::Document`]
    Document,
    /// [`NodeKind::Element`]
    Element,
    /// [`NodeKind::Attribute`]
    Attribute,
    /// [`NodeKind::Text`]
    Text,
    /// [`NodeKind::CData`]
    CData,
    /// [`NodeKind::Comment`]
    Comment,
    /// [`NodeKind::ProcessingInstruction`]
    ProcessingInstruction,
    /// [`NodeKind::EntityRef`]
    EntityRef,
    /// [`NodeKind::DocumentType`]
    DocumentType,
}

impl NodeKind {
    /// Returns the payload-free tag for this kind.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Document => NodeType::Document,
            Self::Element { .. } => NodeType::Element,
            Self::Attribute { .. } => NodeType::Attribute,
            Self::Text { .. } => NodeType::Text,
            Self::CData { .. } => NodeType::CData,
            Self::Comment { .. } => NodeType::Comment,
            Self::ProcessingInstruction { .. } => NodeType::ProcessingInstruction,
            Self::EntityRef { .. } => NodeType::EntityRef,
            Self::DocumentType { .. } => NodeType::DocumentType,
        }
    }
}

impl NodeType {
    /// Returns `true` for the kinds that carry character data inline with
    /// their siblings (text, CDATA, entity references).
    #[must_use]
    pub fn is_text_like(self) -> bool {
        matches!(self, Self::Text | Self::CData | Self::EntityRef)
    }
}
