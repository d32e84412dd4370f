//! Declaration extraction.
//!
//! [`extract`] walks a flat declaration tree (see [`parse`]) and builds the
//! typed views a DTD wrapper hands out: element, attribute, entity and
//! notation declarations keyed by name, plus every declaration in document
//! order.
//!
//! Extraction runs in two passes. The first classifies nodes by tag name and
//! recurses into anything it does not recognize. The second attaches each
//! attribute declaration to the element it names and each content model to
//! its element, unless that element is declared `EMPTY`. References to
//! undeclared elements are dropped.
//!
//! ```
//! use xmlfacade::dtd::Declarations;
//!
//! let decls = Declarations::from_internal_subset(Some(
//!     "<!ELEMENT foo (#PCDATA)><!ATTLIST foo bar CDATA #IMPLIED>",
//! ));
//! let foo = &decls.elements()["foo"];
//! assert_eq!(foo.attributes().len(), 1);
//! assert_eq!(foo.attributes()[0].name(), "bar");
//! ```

pub mod parse;

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::{Error, ParseError};
use crate::tree::{Document, NodeId, NodeType};

/// An `<!ELEMENT>` declaration.
#[derive(Debug)]
pub struct ElementDecl {
    name: String,
    node_id: NodeId,
    model: Option<String>,
    content_model: Option<Arc<ContentModel>>,
    attributes: Vec<Arc<AttributeDecl>>,
}

impl ElementDecl {
    /// The declared element name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declaration's node in the declaration tree.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// The raw content specification (`EMPTY`, `ANY`, `(a,b)*`, ...).
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// True for `<!ELEMENT name EMPTY>`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.model.as_deref() == Some("EMPTY")
    }

    /// The attached content model; never set for `EMPTY` elements.
    #[must_use]
    pub fn content_model(&self) -> Option<&Arc<ContentModel>> {
        self.content_model.as_ref()
    }

    /// Attribute declarations naming this element, in declaration order.
    #[must_use]
    pub fn attributes(&self) -> &[Arc<AttributeDecl>] {
        &self.attributes
    }
}

/// How an attribute's default is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultKind {
    /// `#REQUIRED`
    Required,
    /// `#IMPLIED`
    Implied,
    /// `#FIXED "value"`
    Fixed,
    /// A bare literal default.
    Value,
}

/// One attribute definition from an `<!ATTLIST>` declaration.
#[derive(Debug)]
pub struct AttributeDecl {
    element_name: String,
    name: String,
    node_id: NodeId,
    attribute_type: Option<String>,
    default_kind: DefaultKind,
    default_value: Option<String>,
    enumeration: Vec<String>,
}

impl AttributeDecl {
    /// The element this attribute belongs to.
    #[must_use]
    pub fn element_name(&self) -> &str {
        &self.element_name
    }

    /// The attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declaration's node in the declaration tree.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// The declared type: `CDATA`, `ID`, `NMTOKENS`, `ENUMERATION`, ...
    #[must_use]
    pub fn attribute_type(&self) -> Option<&str> {
        self.attribute_type.as_deref()
    }

    #[must_use]
    pub fn default_kind(&self) -> DefaultKind {
        self.default_kind
    }

    /// The default literal, for `#FIXED` and bare defaults.
    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    /// Allowed values of an enumerated or `NOTATION` attribute.
    #[must_use]
    pub fn enumeration(&self) -> &[String] {
        &self.enumeration
    }
}

/// Which flavor of `<!ENTITY>` a declaration is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Internal,
    External,
    /// External with an `NDATA` notation.
    Unparsed,
}

/// A general entity declaration.
#[derive(Debug)]
pub struct EntityDecl {
    name: String,
    node_id: NodeId,
    kind: EntityKind,
    value: Option<String>,
    public_id: Option<String>,
    system_id: Option<String>,
    notation: Option<String>,
}

impl EntityDecl {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Replacement text of an internal entity.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    #[must_use]
    pub fn public_id(&self) -> Option<&str> {
        self.public_id.as_deref()
    }

    #[must_use]
    pub fn system_id(&self) -> Option<&str> {
        self.system_id.as_deref()
    }

    /// Notation of an unparsed entity.
    #[must_use]
    pub fn notation(&self) -> Option<&str> {
        self.notation.as_deref()
    }
}

/// A `<!NOTATION>` declaration.
#[derive(Debug)]
pub struct NotationDecl {
    name: String,
    node_id: NodeId,
    public_id: Option<String>,
    system_id: Option<String>,
}

impl NotationDecl {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    #[must_use]
    pub fn public_id(&self) -> Option<&str> {
        self.public_id.as_deref()
    }

    #[must_use]
    pub fn system_id(&self) -> Option<&str> {
        self.system_id.as_deref()
    }
}

/// The parenthesised content model of an element, whitespace removed.
#[derive(Debug)]
pub struct ContentModel {
    element_name: String,
    node_id: NodeId,
    model: String,
}

impl ContentModel {
    #[must_use]
    pub fn element_name(&self) -> &str {
        &self.element_name
    }

    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Any declaration, as listed by [`Declarations::all`].
#[derive(Debug, Clone)]
pub enum Declaration {
    Element(Arc<ElementDecl>),
    Attribute(Arc<AttributeDecl>),
    Entity(Arc<EntityDecl>),
    Notation(Arc<NotationDecl>),
}

impl Declaration {
    /// The declared name (the attribute name for attribute declarations).
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Element(d) => d.name(),
            Self::Attribute(d) => d.name(),
            Self::Entity(d) => d.name(),
            Self::Notation(d) => d.name(),
        }
    }

    #[must_use]
    pub fn node_id(&self) -> NodeId {
        match self {
            Self::Element(d) => d.node_id(),
            Self::Attribute(d) => d.node_id(),
            Self::Entity(d) => d.node_id(),
            Self::Notation(d) => d.node_id(),
        }
    }
}

/// Everything extracted from one declaration tree.
///
/// The name-keyed maps keep the first-seen order of their keys; when a name
/// is declared twice the later declaration replaces the earlier one. The
/// [`all`](Self::all) list keeps every declaration.
#[derive(Debug, Default)]
pub struct Declarations {
    elements: IndexMap<String, Arc<ElementDecl>>,
    attributes: IndexMap<String, Arc<AttributeDecl>>,
    entities: IndexMap<String, Arc<EntityDecl>>,
    notations: IndexMap<String, Arc<NotationDecl>>,
    content_models: IndexMap<String, Arc<ContentModel>>,
    all: Vec<Declaration>,
    malformed: Vec<Error>,
    parse_error: Option<ParseError>,
    source: Option<Document>,
}

impl Declarations {
    /// Parses an internal subset and extracts its declarations.
    ///
    /// `None` yields empty collections. A subset that fails to parse is
    /// logged and also yields empty collections; the error stays available
    /// through [`parse_error`](Self::parse_error).
    #[must_use]
    pub fn from_internal_subset(subset: Option<&str>) -> Self {
        let Some(subset) = subset else {
            return Self::default();
        };
        match parse::parse_internal_subset(subset) {
            Ok(tree) => {
                let mut decls = extract(Some(&tree));
                decls.source = Some(tree);
                decls
            }
            Err(err) => {
                warn!(error = %err, "cannot parse internal subset");
                Self {
                    parse_error: Some(err),
                    ..Self::default()
                }
            }
        }
    }

    /// Element declarations by element name.
    #[must_use]
    pub fn elements(&self) -> &IndexMap<String, Arc<ElementDecl>> {
        &self.elements
    }

    /// Attribute declarations by attribute name.
    #[must_use]
    pub fn attributes(&self) -> &IndexMap<String, Arc<AttributeDecl>> {
        &self.attributes
    }

    /// General entity declarations by entity name.
    #[must_use]
    pub fn entities(&self) -> &IndexMap<String, Arc<EntityDecl>> {
        &self.entities
    }

    /// Notation declarations by notation name.
    #[must_use]
    pub fn notations(&self) -> &IndexMap<String, Arc<NotationDecl>> {
        &self.notations
    }

    /// Content models by element name, including those of elements that
    /// were never declared.
    #[must_use]
    pub fn content_models(&self) -> &IndexMap<String, Arc<ContentModel>> {
        &self.content_models
    }

    /// Every element, attribute, entity and notation declaration in
    /// document order.
    #[must_use]
    pub fn all(&self) -> &[Declaration] {
        &self.all
    }

    /// Declarations that were skipped for lacking their name.
    #[must_use]
    pub fn malformed(&self) -> &[Error] {
        &self.malformed
    }

    /// Why the internal subset could not be read, if it could not.
    #[must_use]
    pub fn parse_error(&self) -> Option<&ParseError> {
        self.parse_error.as_ref()
    }

    /// The declaration tree the views point into, when parsed here.
    #[must_use]
    pub fn source(&self) -> Option<&Document> {
        self.source.as_ref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// First-pass record of an element declaration; attributes and content
/// model are attached in the second pass.
struct PendingElement {
    name: String,
    node_id: NodeId,
    model: Option<String>,
}

enum Entry {
    Element(PendingElement),
    Attribute(Arc<AttributeDecl>),
    Entity(Arc<EntityDecl>),
    Notation(Arc<NotationDecl>),
}

#[derive(Default)]
struct Collector {
    entries: Vec<Entry>,
    content_models: IndexMap<String, Arc<ContentModel>>,
    malformed: Vec<Error>,
}

/// Extracts the declarations below a flat declaration tree.
///
/// `None` yields empty collections.
#[must_use]
pub fn extract(tree: Option<&Document>) -> Declarations {
    let Some(tree) = tree else {
        return Declarations::default();
    };

    let mut collector = Collector::default();
    collector.walk(tree, tree.root());
    let Collector {
        entries,
        content_models,
        malformed,
    } = collector;

    let mut decls = Declarations {
        malformed,
        ..Declarations::default()
    };

    let attribute_decls: Vec<&Arc<AttributeDecl>> = entries
        .iter()
        .filter_map(|entry| match entry {
            Entry::Attribute(decl) => Some(decl),
            _ => None,
        })
        .collect();

    for entry in &entries {
        let decl = match entry {
            Entry::Element(pending) => {
                let element = Arc::new(finish_element(pending, &attribute_decls, &content_models));
                decls.elements.insert(element.name.clone(), Arc::clone(&element));
                Declaration::Element(element)
            }
            Entry::Attribute(attr) => {
                decls.attributes.insert(attr.name.clone(), Arc::clone(attr));
                Declaration::Attribute(Arc::clone(attr))
            }
            Entry::Entity(entity) => {
                decls.entities.insert(entity.name.clone(), Arc::clone(entity));
                Declaration::Entity(Arc::clone(entity))
            }
            Entry::Notation(notation) => {
                decls.notations.insert(notation.name.clone(), Arc::clone(notation));
                Declaration::Notation(Arc::clone(notation))
            }
        };
        decls.all.push(decl);
    }
    decls.content_models = content_models;

    debug!(
        elements = decls.elements.len(),
        attributes = decls.attributes.len(),
        entities = decls.entities.len(),
        notations = decls.notations.len(),
        malformed = decls.malformed.len(),
        "declarations extracted"
    );
    decls
}

fn finish_element(
    pending: &PendingElement,
    attribute_decls: &[&Arc<AttributeDecl>],
    content_models: &IndexMap<String, Arc<ContentModel>>,
) -> ElementDecl {
    let attributes = attribute_decls
        .iter()
        .filter(|attr| attr.element_name == pending.name)
        .map(|&attr| Arc::clone(attr))
        .collect();
    let content_model = if pending.model.as_deref() == Some("EMPTY") {
        None
    } else {
        content_models.get(&pending.name).cloned()
    };
    ElementDecl {
        name: pending.name.clone(),
        node_id: pending.node_id,
        model: pending.model.clone(),
        content_model,
        attributes,
    }
}

impl Collector {
    fn walk(&mut self, tree: &Document, node: NodeId) {
        for child in tree.children(node) {
            if tree.node_type(child) != NodeType::Element {
                continue;
            }
            let recognized = match tree.node_name(child).unwrap_or_default() {
                "elementDecl" => self.element(tree, child),
                "attributeDecl" => self.attribute(tree, child),
                tag @ ("internalEntityDecl" | "externalEntityDecl" | "unparsedEntityDecl") => {
                    self.entity(tree, child, tag)
                }
                "notationDecl" => self.notation(tree, child),
                "contentModel" => self.content_model(tree, child),
                "parameterEntityDecl" => Ok(()),
                _ => {
                    self.walk(tree, child);
                    Ok(())
                }
            };
            if let Err(err) = recognized {
                warn!(error = %err, node = child.into_raw(), "skipping declaration");
                self.malformed.push(err);
            }
        }
    }

    fn element(&mut self, tree: &Document, node: NodeId) -> Result<(), Error> {
        let name = required(tree, node, "ename")?;
        self.entries.push(Entry::Element(PendingElement {
            name,
            node_id: node,
            model: optional(tree, node, "model"),
        }));
        Ok(())
    }

    fn attribute(&mut self, tree: &Document, node: NodeId) -> Result<(), Error> {
        let element_name = required(tree, node, "ename")?;
        let name = required(tree, node, "aname")?;
        let default_kind = match tree.attribute(node, "default") {
            Some("#REQUIRED") => DefaultKind::Required,
            Some("#IMPLIED") => DefaultKind::Implied,
            Some("#FIXED") => DefaultKind::Fixed,
            _ => DefaultKind::Value,
        };
        let enumeration = tree
            .attribute(node, "enumeration")
            .map(|values| values.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        self.entries.push(Entry::Attribute(Arc::new(AttributeDecl {
            element_name,
            name,
            node_id: node,
            attribute_type: optional(tree, node, "atype"),
            default_kind,
            default_value: optional(tree, node, "value"),
            enumeration,
        })));
        Ok(())
    }

    fn entity(&mut self, tree: &Document, node: NodeId, tag: &str) -> Result<(), Error> {
        let name = required(tree, node, "name")?;
        let kind = match tag {
            "internalEntityDecl" => EntityKind::Internal,
            "unparsedEntityDecl" => EntityKind::Unparsed,
            _ => EntityKind::External,
        };
        self.entries.push(Entry::Entity(Arc::new(EntityDecl {
            name,
            node_id: node,
            kind,
            value: optional(tree, node, "value"),
            public_id: optional(tree, node, "pubid"),
            system_id: optional(tree, node, "sysid"),
            notation: optional(tree, node, "notation"),
        })));
        Ok(())
    }

    fn notation(&mut self, tree: &Document, node: NodeId) -> Result<(), Error> {
        let name = required(tree, node, "name")?;
        self.entries.push(Entry::Notation(Arc::new(NotationDecl {
            name,
            node_id: node,
            public_id: optional(tree, node, "pubid"),
            system_id: optional(tree, node, "sysid"),
        })));
        Ok(())
    }

    fn content_model(&mut self, tree: &Document, node: NodeId) -> Result<(), Error> {
        let element_name = required(tree, node, "ename")?;
        let model = optional(tree, node, "model").unwrap_or_default();
        self.content_models.insert(
            element_name.clone(),
            Arc::new(ContentModel {
                element_name,
                node_id: node,
                model,
            }),
        );
        Ok(())
    }
}

fn required(tree: &Document, node: NodeId, attribute: &'static str) -> Result<String, Error> {
    match tree.attribute(node, attribute) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(Error::MalformedDeclaration {
            kind: tree.node_name(node).unwrap_or_default().to_string(),
            attribute,
        }),
    }
}

fn optional(tree: &Document, node: NodeId, attribute: &str) -> Option<String> {
    tree.attribute(node, attribute).map(str::to_string)
}
