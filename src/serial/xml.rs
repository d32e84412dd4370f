//! XML dialect.
//!
//! A document is written as its prolog, its document type and its root
//! element followed by a newline. Formatting puts each child of an element
//! on its own indented line, but is switched off for the subtree of any
//! element holding text, CDATA or entity reference children so that mixed
//! content is written untouched.

use crate::cache::{Node, NodeVariant};
use crate::error::{Error, Result};
use crate::serial::{save_doctype, SaveContext, Source};

/// Writes the prolog, document type and root element of the document.
///
/// # Errors
///
/// Returns [`Error::MissingRoot`] if the document has no root element.
pub fn save_document(src: Source<'_>, ctx: &mut SaveContext) -> Result<()> {
    let doc = src.doc();
    let root = doc.root_element().ok_or(Error::MissingRoot)?;

    if !ctx.no_declaration() {
        ctx.append("<?xml version=\"");
        ctx.append(doc.version.as_deref().unwrap_or("1.0"));
        ctx.append("\"");
        let encoding = ctx
            .encoding()
            .map(str::to_string)
            .or_else(|| doc.encoding.clone().filter(|e| !e.is_empty()));
        if let Some(encoding) = encoding {
            ctx.append(" encoding=\"");
            ctx.append(&encoding);
            ctx.append("\"");
        }
        ctx.append(" standalone=\"");
        ctx.append(if doc.standalone == Some(true) { "yes" } else { "no" });
        ctx.append("\"?>\n");
    }

    if let Some(doctype) = doc.doctype() {
        save_node(src, &src.wrap(doctype)?, ctx)?;
        ctx.append("\n");
    }

    save_node(src, &src.wrap(root)?, ctx)?;
    ctx.append("\n");
    Ok(())
}

/// Writes one node and its subtree. The document node writes its root
/// element, or nothing when there is none.
///
/// # Errors
///
/// Returns [`Error::UnknownNodeKind`] if a node cannot be resolved.
pub fn save_node(src: Source<'_>, node: &Node, ctx: &mut SaveContext) -> Result<()> {
    match node.variant() {
        NodeVariant::Document => {
            if let Some(root) = src.doc().root_element() {
                save_node(src, &src.wrap(root)?, ctx)?;
            }
        }
        NodeVariant::Element => save_element(src, node, ctx)?,
        NodeVariant::Attribute => save_attribute(src, node, ctx),
        NodeVariant::Text | NodeVariant::CData => {
            if ctx.format() {
                ctx.indent();
            }
            ctx.append_escaped(src.text(node));
        }
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
            ctx.append("?>");
        }
        NodeVariant::EntityReference => {
            ctx.append("&");
            ctx.append(&src.name(node));
            ctx.append(";");
        }
        NodeVariant::Dtd(_) => save_doctype(src, node, true, ctx),
    }
    Ok(())
}

fn save_element(src: Source<'_>, node: &Node, ctx: &mut SaveContext) -> Result<()> {
    let children = src.children(node)?;
    let format = ctx.format();
    if format && children.iter().any(|c| c.node_type().is_text_like()) {
        ctx.set_format(false);
    }

    let name = src.name(node);
    ctx.append("<");
    ctx.append(&name);
    for attr in src.attributes(node)? {
        save_attribute(src, &attr, ctx);
    }

    if children.is_empty() && !ctx.no_empty_tags() {
        ctx.append("/>");
        ctx.set_format(format);
        return Ok(());
    }
    ctx.append(">");

    if !children.is_empty() {
        if ctx.format() {
            ctx.append("\n");
        }
        ctx.increase_level();
        for child in &children {
            if ctx.format() {
                ctx.indent();
            }
            save_node(src, child, ctx)?;
            if ctx.format() {
                ctx.append("\n");
            }
        }
        ctx.decrease_level();
        if ctx.format() {
            ctx.indent();
        }
    }

    ctx.append("</");
    ctx.append(&name);
    ctx.append(">");
    ctx.set_format(format);
    Ok(())
}

fn save_attribute(src: Source<'_>, node: &Node, ctx: &mut SaveContext) {
    ctx.append(" ");
    ctx.append(&src.name(node));
    ctx.append("=\"");
    ctx.append_escaped(src.text(node));
    ctx.append("\"");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::serial::{serialize_document, serialize_node, SaveOptions};
    use crate::tree::{Document, NodeKind};
    use pretty_assertions::assert_eq;

    fn save(xml: &str, options: &SaveOptions) -> String {
        let doc = Document::parse_str(xml).unwrap();
        serialize_document(&doc, options).unwrap()
    }

    #[test]
    fn test_serialize_empty_element() {
        let mut doc = Document::new();
        let root = doc.root();
        let elem = doc.create_node(NodeKind::Element {
            name: "br".to_string(),
            prefix: None,
            namespace: None,
            attributes: vec![],
        });
        doc.append_child(root, elem);
        assert_eq!(
            serialize_document(&doc, &SaveOptions::default()).unwrap(),
            "<?xml version=\"1.0\" standalone=\"no\"?>\n<br/>\n"
        );
    }

    #[test]
    fn test_serialize_no_empty_tags() {
        let opts = SaveOptions::default().no_declaration(true).no_empty_tags(true);
        assert_eq!(save("<r><e/></r>", &opts), "<r><e></e></r>\n");
    }

    #[test]
    fn test_serialize_prolog() {
        let xml = r#"<?xml version="1.0" encoding="ISO-8859-1" standalone="yes"?><r/>"#;
        assert_eq!(
            save(xml, &SaveOptions::default()),
            "<?xml version=\"1.0\" encoding=\"ISO-8859-1\" standalone=\"yes\"?>\n<r/>\n"
        );
        assert_eq!(
            save(xml, &SaveOptions::default().encoding("UTF-8")),
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<r/>\n"
        );
    }

    #[test]
    fn test_serialize_element_with_attributes() {
        let opts = SaveOptions::default().no_declaration(true);
        assert_eq!(
            save(r#"<div id="main" class="a &amp; b"/>"#, &opts),
            "<div id=\"main\" class=\"a &amp; b\"/>\n"
        );
    }

    #[test]
    fn test_serialize_escaping() {
        let opts = SaveOptions::default().no_declaration(true);
        assert_eq!(
            save("<p>a &lt; b &amp; c &gt; d \"q\"&#13;</p>", &opts),
            "<p>a &lt; b &amp; c &gt; d \"q\"&#13;</p>\n"
        );
    }

    #[test]
    fn test_serialize_format() {
        let opts = SaveOptions::default().no_declaration(true).format(true);
        assert_eq!(
            save("<r><a><b/></a><c/></r>", &opts),
            "<r>\n  <a>\n    <b/>\n  </a>\n  <c/>\n</r>\n"
        );
    }

    #[test]
    fn test_serialize_format_skips_mixed_content() {
        let opts = SaveOptions::default().no_declaration(true).format(true);
        assert_eq!(
            save("<r><p>x<b>y</b></p><q/></r>", &opts),
            "<r>\n  <p>x<b>y</b></p>\n  <q/>\n</r>\n"
        );
    }

    #[test]
    fn test_serialize_doctype_and_root_only() {
        let xml = "<!DOCTYPE r SYSTEM \"r.dtd\" [<!ELEMENT r EMPTY>]><?pi x?><r/><!--tail-->";
        let opts = SaveOptions::default().no_declaration(true);
        assert_eq!(
            save(xml, &opts),
            "<!DOCTYPE r SYSTEM \"r.dtd\" [<!ELEMENT r EMPTY>]>\n<r/>\n"
        );
    }

    #[test]
    fn test_serialize_cdata_comment_pi_entity() {
        let opts = SaveOptions::default().no_declaration(true);
        assert_eq!(
            save("<!DOCTYPE r [<!ENTITY e 'v'>]><r><![CDATA[<x>]]><!--c--><?t d?>&e;</r>", &opts),
            "<!DOCTYPE r [<!ENTITY e 'v'>]>\n<r>&lt;x&gt;<!--c--><?t d?>&e;</r>\n"
        );
    }

    #[test]
    fn test_serialize_namespaced() {
        let opts = SaveOptions::default().no_declaration(true);
        let xml = r#"<p:r xmlns:p="urn:p" p:a="1"><p:c/></p:r>"#;
        assert_eq!(save(xml, &opts), format!("{xml}\n"));
    }

    #[test]
    fn test_missing_root() {
        let doc = Document::new();
        assert!(matches!(
            serialize_document(&doc, &SaveOptions::default()),
            Err(crate::Error::MissingRoot)
        ));
    }

    #[test]
    fn test_serialize_single_node() {
        let doc = Document::parse_str(r#"<r><a x="1">t</a></r>"#).unwrap();
        let r = doc.root_element().unwrap();
        let a = doc.first_child(r).unwrap();
        let opts = SaveOptions::default();
        assert_eq!(serialize_node(&doc, a, &opts).unwrap(), "<a x=\"1\">t</a>");
        let attr = doc.attributes(a)[0];
        assert_eq!(serialize_node(&doc, attr, &opts).unwrap(), " x=\"1\"");
    }
}
