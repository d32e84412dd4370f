//! Positional path expressions.
//!
//! [`path_of`] renders the location of a node as an XPath-like string such
//! as `/root/child[2]/text()` or `/root/@xml:lang`. Steps are built from the
//! node upward and prepended as the walk ascends.
//!
//! A step carries an index only when it is ambiguous: the index counts the
//! preceding matching siblings plus one, and the first of several matching
//! siblings gets `[1]`. A node without matching siblings gets no index.

use crate::error::{Error, Result};
use crate::tree::{Document, NodeId, NodeKind, NodeType};

/// Returns the positional path of `node` within `doc`.
///
/// # Errors
///
/// Returns [`Error::UnknownNodeKind`] if `node` is not a node of `doc`.
///
/// ```
/// use xmlfacade::path::path_of;
/// use xmlfacade::tree::Document;
///
/// let doc = Document::parse_str("<root><child/><child/></root>").unwrap();
/// let root = doc.root_element().unwrap();
/// let second = doc.last_child(root).unwrap();
/// assert_eq!(path_of(&doc, second).unwrap(), "/root/child[2]");
/// ```
pub fn path_of(doc: &Document, node: NodeId) -> Result<String> {
    if doc.get(node).is_none() {
        return Err(Error::UnknownNodeKind(node.into_raw()));
    }
    let mut steps: Vec<String> = Vec::new();
    let mut cur = Some(node);

    while let Some(id) = cur {
        let step = match &doc.node(id).kind {
            NodeKind::Document => {
                if steps.is_empty() {
                    steps.push("/".to_string());
                }
                break;
            }
            NodeKind::Element { name, prefix, namespace, .. } => {
                let (step, wildcard) = match (prefix, namespace) {
                    (Some(prefix), Some(_)) => (format!("{prefix}:{name}"), false),
                    (None, Some(_)) => ("*".to_string(), true),
                    (_, None) => (name.clone(), false),
                };
                let qname = doc.qualified_name(id);
                let index = position(doc, id, |sibling| {
                    doc.node_type(sibling) == NodeType::Element
                        && (wildcard || doc.qualified_name(sibling) == qname)
                });
                Some(render("/", &step, index))
            }
            NodeKind::Comment { .. } => {
                let index = position(doc, id, |s| doc.node_type(s) == NodeType::Comment);
                Some(render("/", "comment()", index))
            }
            NodeKind::Text { .. } | NodeKind::CData { .. } => {
                let index = position(doc, id, |s| {
                    matches!(doc.node_type(s), NodeType::Text | NodeType::CData)
                });
                Some(render("/", "text()", index))
            }
            NodeKind::ProcessingInstruction { target, .. } => {
                let index = position(doc, id, |s| {
                    matches!(
                        &doc.node(s).kind,
                        NodeKind::ProcessingInstruction { target: t, .. } if t == target
                    )
                });
                Some(render("/", &format!("processing-instruction('{target}')"), index))
            }
            NodeKind::Attribute { name, prefix, namespace, .. } => {
                let step = match (prefix, namespace) {
                    (Some(prefix), Some(_)) => format!("{prefix}:{name}"),
                    _ => name.clone(),
                };
                Some(render("/@", &step, None))
            }
            NodeKind::EntityRef { .. } | NodeKind::DocumentType { .. } => None,
        };
        if let Some(step) = step {
            steps.push(step);
        }
        cur = doc.parent(id);
    }

    Ok(steps.iter().rev().map(String::as_str).collect())
}

/// Computes the 1-based index of `node` among its siblings matching
/// `same`, or `None` when it is the only match.
fn position(doc: &Document, node: NodeId, same: impl Fn(NodeId) -> bool) -> Option<usize> {
    let preceding = preceding_siblings(doc, node).filter(|&s| same(s)).count();
    if preceding > 0 {
        return Some(preceding + 1);
    }
    following_siblings(doc, node).any(same).then_some(1)
}

fn preceding_siblings(doc: &Document, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    std::iter::successors(doc.prev_sibling(node), move |&s| doc.prev_sibling(s))
}

fn following_siblings(doc: &Document, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    std::iter::successors(doc.next_sibling(node), move |&s| doc.next_sibling(s))
}

fn render(sep: &str, name: &str, index: Option<usize>) -> String {
    match index {
        Some(index) => format!("{sep}{name}[{index}]"),
        None => format!("{sep}{name}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(xml: &str) -> Document {
        Document::parse_str(xml).unwrap()
    }

    #[test]
    fn test_document_and_root() {
        let doc = parse("<root/>");
        assert_eq!(path_of(&doc, doc.root()).unwrap(), "/");
        assert_eq!(path_of(&doc, doc.root_element().unwrap()).unwrap(), "/root");
    }

    #[test]
    fn test_unique_child_has_no_index() {
        let doc = parse("<root><child/><other/></root>");
        let root = doc.root_element().unwrap();
        let child = doc.first_child(root).unwrap();
        assert_eq!(path_of(&doc, child).unwrap(), "/root/child");
    }

    #[test]
    fn test_same_name_siblings() {
        let doc = parse("<root><child/><x/><child/><child/></root>");
        let root = doc.root_element().unwrap();
        let kids: Vec<_> = doc.children(root).collect();
        assert_eq!(path_of(&doc, kids[0]).unwrap(), "/root/child[1]");
        assert_eq!(path_of(&doc, kids[1]).unwrap(), "/root/x");
        assert_eq!(path_of(&doc, kids[2]).unwrap(), "/root/child[2]");
        assert_eq!(path_of(&doc, kids[3]).unwrap(), "/root/child[3]");
    }

    #[test]
    fn test_text_and_cdata_share_index() {
        let doc = parse("<r>a<b/><![CDATA[c]]><b/>d</r>");
        let r = doc.root_element().unwrap();
        let kids: Vec<_> = doc.children(r).collect();
        assert_eq!(path_of(&doc, kids[0]).unwrap(), "/r/text()[1]");
        assert_eq!(path_of(&doc, kids[2]).unwrap(), "/r/text()[2]");
        assert_eq!(path_of(&doc, kids[4]).unwrap(), "/r/text()[3]");
    }

    #[test]
    fn test_comments() {
        let doc = parse("<r><!--a--><x/><!--b--><!--c--></r>");
        let r = doc.root_element().unwrap();
        let kids: Vec<_> = doc.children(r).collect();
        assert_eq!(path_of(&doc, kids[0]).unwrap(), "/r/comment()[1]");
        assert_eq!(path_of(&doc, kids[3]).unwrap(), "/r/comment()[3]");

        let single = parse("<r><!--only--></r>");
        let r = single.root_element().unwrap();
        assert_eq!(path_of(&single, single.first_child(r).unwrap()).unwrap(), "/r/comment()");
    }

    #[test]
    fn test_processing_instructions_by_target() {
        let doc = parse("<r><?a x?><?b y?><?a z?></r>");
        let r = doc.root_element().unwrap();
        let kids: Vec<_> = doc.children(r).collect();
        assert_eq!(path_of(&doc, kids[0]).unwrap(), "/r/processing-instruction('a')[1]");
        assert_eq!(path_of(&doc, kids[1]).unwrap(), "/r/processing-instruction('b')");
        assert_eq!(path_of(&doc, kids[2]).unwrap(), "/r/processing-instruction('a')[2]");
    }

    #[test]
    fn test_attributes() {
        let doc = parse(r#"<r xmlns:p="urn:p"><e id="1" p:k="2"/></r>"#);
        let r = doc.root_element().unwrap();
        let e = doc.first_child(r).unwrap();
        let attrs = doc.attributes(e);
        assert_eq!(path_of(&doc, attrs[0]).unwrap(), "/r/e/@id");
        assert_eq!(path_of(&doc, attrs[1]).unwrap(), "/r/e/@p:k");
    }

    #[test]
    fn test_namespaces() {
        let doc = parse(r#"<r xmlns="urn:d" xmlns:p="urn:p"><p:a/><b/><c/></r>"#);
        let r = doc.root_element().unwrap();
        assert_eq!(path_of(&doc, r).unwrap(), "/*");
        let kids: Vec<_> = doc.children(r).collect();
        assert_eq!(path_of(&doc, kids[0]).unwrap(), "/*/p:a");
        // unprefixed namespaced steps count every element sibling
        assert_eq!(path_of(&doc, kids[1]).unwrap(), "/*/*[2]");
        assert_eq!(path_of(&doc, kids[2]).unwrap(), "/*/*[3]");
    }

    #[test]
    fn test_doctype_has_no_step() {
        let doc = parse("<!DOCTYPE r><r/>");
        assert_eq!(path_of(&doc, doc.doctype().unwrap()).unwrap(), "/");
    }

    #[test]
    fn test_foreign_id_is_an_error() {
        let doc = Document::parse_str("<r/>").unwrap();
        let foreign = NodeId::from_raw(500).unwrap();
        assert!(matches!(
            path_of(&doc, foreign),
            Err(Error::UnknownNodeKind(500))
        ));
    }
}
