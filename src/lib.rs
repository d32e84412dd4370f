//! # xmlfacade
//!
//! An identity-stable node graph over parsed XML and HTML trees, with the
//! operations built on top of it: serialization in both dialects, XPath-like
//! node paths, and a typed model of DTD declarations.
//!
//! ## Quick Start
//!
//! ```
//! use xmlfacade::XmlDocument;
//!
//! let doc = XmlDocument::parse("<root><child>Hello</child></root>").unwrap();
//! let root = doc.root().unwrap().unwrap();
//! let child = &doc.children(&root).unwrap()[0];
//!
//! // the same node always resolves to the same wrapper
//! assert_eq!(doc.parent(child).unwrap(), Some(root));
//! assert_eq!(doc.path(child).unwrap(), "/root/child");
//! assert_eq!(
//!     doc.serialize().unwrap(),
//!     "<?xml version=\"1.0\" standalone=\"no\"?>\n<root><child>Hello</child></root>\n"
//! );
//! ```
//!
//! ## Layout
//!
//! - [`tree`]: the arena tree the parsers build
//! - [`parser`], [`html`]: XML and HTML front ends over `quick-xml`
//! - [`cache`]: the node identity cache
//! - [`document`]: [`XmlDocument`], the wrapped document
//! - [`serial`]: XML and HTML serializers
//! - [`path`]: node paths
//! - [`dtd`]: internal subset reader and declaration extraction

pub mod cache;
pub mod document;
pub mod dtd;
pub mod encoding;
pub mod error;
pub mod html;
pub mod parser;
pub mod path;
pub mod serial;
pub mod tree;
pub mod util;

// Re-export primary types at the crate root for convenience.
pub use cache::Node;
pub use document::{Dtd, XmlDocument};
pub use error::{Error, Result};
pub use serial::SaveOptions;
pub use tree::{Document, NodeId};
