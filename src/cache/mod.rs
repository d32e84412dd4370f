//! Node identity cache.
//!
//! Each tree node is represented to callers by exactly one [`Node`] for as
//! long as the owning document lives. Wrappers are created lazily the first
//! time a node is observed and kept in a side table keyed by [`NodeId`];
//! every later lookup hands out a clone of the same `Arc`, so `==` on nodes
//! is reference equality.
//!
//! The table is guarded by a mutex and lookups create-if-absent under the
//! lock, so threads resolving the same node concurrently all get the same
//! wrapper.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::trace;

use crate::dtd::Declarations;
use crate::error::{Error, Result};
use crate::tree::{Document, NodeId, NodeKind, NodeType};

/// Kind-specific state of a wrapper.
#[derive(Debug)]
pub enum NodeVariant {
    Document,
    Element,
    Attribute,
    Text,
    CData,
    Comment,
    ProcessingInstruction,
    EntityReference,
    /// A document type declaration, with its lazily extracted declarations.
    Dtd(Arc<DtdState>),
}

impl NodeVariant {
    fn for_kind(kind: &NodeKind) -> Self {
        match kind {
            NodeKind::Document => Self::Document,
            NodeKind::Element { .. } => Self::Element,
            NodeKind::Attribute { .. } => Self::Attribute,
            NodeKind::Text { .. } => Self::Text,
            NodeKind::CData { .. } => Self::CData,
            NodeKind::Comment { .. } => Self::Comment,
            NodeKind::ProcessingInstruction { .. } => Self::ProcessingInstruction,
            NodeKind::EntityRef { .. } => Self::EntityReference,
            NodeKind::DocumentType { .. } => Self::Dtd(Arc::default()),
        }
    }

    /// The tree node type this variant wraps.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Document => NodeType::Document,
            Self::Element => NodeType::Element,
            Self::Attribute => NodeType::Attribute,
            Self::Text => NodeType::Text,
            Self::CData => NodeType::CData,
            Self::Comment => NodeType::Comment,
            Self::ProcessingInstruction => NodeType::ProcessingInstruction,
            Self::EntityReference => NodeType::EntityRef,
            Self::Dtd(_) => NodeType::DocumentType,
        }
    }
}

/// Memoized declarations of a DTD wrapper.
#[derive(Debug, Default)]
pub struct DtdState {
    declarations: OnceLock<Arc<Declarations>>,
}

impl DtdState {
    /// Returns the declarations, computing them with `extract` on first
    /// use. Concurrent first calls still produce a single result.
    pub fn declarations_with(&self, extract: impl FnOnce() -> Declarations) -> &Arc<Declarations> {
        self.declarations.get_or_init(|| Arc::new(extract()))
    }

    /// True once the declarations have been computed.
    #[must_use]
    pub fn is_extracted(&self) -> bool {
        self.declarations.get().is_some()
    }
}

#[derive(Debug)]
struct Wrapper {
    id: NodeId,
    variant: NodeVariant,
}

/// Identity-stable handle to a tree node.
///
/// Cloning is cheap and yields the same wrapper; two `Node`s compare equal
/// only if they are the same wrapper.
#[derive(Clone)]
pub struct Node(Arc<Wrapper>);

impl Node {
    /// The wrapped node's id.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.0.id
    }

    #[must_use]
    pub fn variant(&self) -> &NodeVariant {
        &self.0.variant
    }

    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.0.variant.node_type()
    }

    /// DTD state, if this wraps a document type declaration.
    #[must_use]
    pub fn as_dtd(&self) -> Option<&Arc<DtdState>> {
        match &self.0.variant {
            NodeVariant::Dtd(state) => Some(state),
            _ => None,
        }
    }

    /// True if `self` and `other` are the same wrapper.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.0.id.into_raw())
            .field("type", &self.node_type())
            .finish()
    }
}

/// Side table from node ids to their wrappers.
#[derive(Debug, Default)]
pub struct IdentityCache {
    table: Mutex<HashMap<NodeId, Node>>,
}

impl IdentityCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the wrapper for `id`, creating it on first observation.
    ///
    /// `None` in gives `None` out, so missing parents and roots pass
    /// straight through.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownNodeKind`] if `id` is not a node of `doc`.
    pub fn resolve(&self, doc: &Document, id: Option<NodeId>) -> Result<Option<Node>> {
        let Some(id) = id else {
            return Ok(None);
        };
        let data = doc.get(id).ok_or(Error::UnknownNodeKind(id.into_raw()))?;

        let mut table = self.lock();
        let node = table.entry(id).or_insert_with(|| {
            let variant = NodeVariant::for_kind(&data.kind);
            trace!(node = id.into_raw(), kind = ?variant.node_type(), "wrapper created");
            Node(Arc::new(Wrapper { id, variant }))
        });
        Ok(Some(node.clone()))
    }

    /// Returns the wrapper for `id` if one was already created.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<Node> {
        self.lock().get(&id).cloned()
    }

    /// Number of wrappers created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<NodeId, Node>> {
        // entries are only ever inserted whole, so a poisoned table is intact
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
