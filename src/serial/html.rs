//! HTML dialect.
//!
//! Differences from the XML dialect:
//!
//! - no prolog; the document type is written first, then every top-level
//!   node
//! - empty elements are closed with an explicit end tag right after the
//!   start tag
//! - attribute values are written as they are, without escaping
//! - formatting only adds line breaks, never indentation: after the start
//!   tag (when the element has children) and after the end tag of an
//!   element whose next sibling is not text, and whose parent's name does
//!   not start with `p`

use crate::cache::{Node, NodeVariant};
use crate::error::Result;
use crate::serial::{save_doctype, SaveContext, Source};
use crate::tree::NodeType;

/// Writes the document type and all top-level nodes of the document.
///
/// # Errors
///
/// Returns [`Error::UnknownNodeKind`](crate::Error::UnknownNodeKind) if a
/// node cannot be resolved.
pub fn save_document(src: Source<'_>, ctx: &mut SaveContext) -> Result<()> {
    let doc = src.doc();
    if let Some(doctype) = doc.doctype() {
        save_node(src, &src.wrap(doctype)?, ctx)?;
        ctx.append("\n");
    }
    let document = src.wrap(doc.root())?;
    for child in src.children(&document)? {
        if !matches!(child.variant(), NodeVariant::Dtd(_)) {
            save_node(src, &child, ctx)?;
        }
    }
    ctx.append("\n");
    Ok(())
}

/// Writes one node and its subtree.
///
/// # Errors
///
/// See [`save_document`].
pub fn save_node(src: Source<'_>, node: &Node, ctx: &mut SaveContext) -> Result<()> {
    match node.variant() {
        NodeVariant::Document => {
            for child in src.children(node)? {
                save_node(src, &child, ctx)?;
            }
        }
        NodeVariant::Element => save_element(src, node, ctx)?,
        NodeVariant::Attribute => save_attribute(src, node, ctx),
        NodeVariant::Text | NodeVariant::CData => ctx.append_escaped(src.text(node)),
        NodeVariant::Comment => {
            ctx.append("<!--");
            ctx.append(src.text(node));
            ctx.append("-->");
        }
        NodeVariant::ProcessingInstruction => {
            ctx.append("<?");
            ctx.append(&src.name(node));
            if let Some(data) = src.doc().node_text(node.id()) {
                ctx.append(" ");
                ctx.append(data);
            }
            ctx.append(">");
        }
        NodeVariant::EntityReference => {
            ctx.append("&");
            ctx.append(&src.name(node));
            ctx.append(";");
        }
        NodeVariant::Dtd(_) => save_doctype(src, node, false, ctx),
    }
    Ok(())
}

fn save_element(src: Source<'_>, node: &Node, ctx: &mut SaveContext) -> Result<()> {
    let name = src.name(node);
    ctx.append("<");
    ctx.append(&name);
    for attr in src.attributes(node)? {
        save_attribute(src, &attr, ctx);
    }
    ctx.append(">");

    let newline = ctx.format() && breaks_line(src, node);
    let children = src.children(node)?;
    if newline && !children.is_empty() {
        ctx.append("\n");
    }

    for child in &children {
        save_node(src, child, ctx)?;
    }

    ctx.append("</");
    ctx.append(&name);
    ctx.append(">");
    if newline {
        ctx.append("\n");
    }
    Ok(())
}

/// Line breaks go around an element followed by a non-text sibling,
/// except inside elements whose name starts with `p`.
fn breaks_line(src: Source<'_>, node: &Node) -> bool {
    let doc = src.doc();
    let Some(next) = doc.next_sibling(node.id()) else {
        return false;
    };
    if matches!(doc.node_type(next), NodeType::Text | NodeType::EntityRef) {
        return false;
    }
    let Some(parent) = doc.parent(node.id()) else {
        return false;
    };
    let parent_name = match doc.node_type(parent) {
        NodeType::Document => "#document",
        _ => doc.node_name(parent).unwrap_or_default(),
    };
    !parent_name.starts_with('p')
}

fn save_attribute(src: Source<'_>, node: &Node, ctx: &mut SaveContext) {
    ctx.append(" ");
    ctx.append(&src.name(node));
    ctx.append("=");
    ctx.append_quoted(src.text(node));
}
