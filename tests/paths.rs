//! Node path tests over wrapped documents.

#![allow(clippy::unwrap_used)]

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use xmlfacade::{Node, XmlDocument};

fn all_paths(doc: &XmlDocument) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = vec![doc.document_node().unwrap()];
    while let Some(node) = stack.pop() {
        out.push(doc.path(&node).unwrap());
        for attr in doc.attribute_nodes(&node).unwrap() {
            out.push(doc.path(&attr).unwrap());
        }
        let children: Vec<Node> = doc.children(&node).unwrap();
        stack.extend(children.into_iter().rev());
    }
    out
}

// ---------------------------------------------------------------------------
// Fixed documents
// ---------------------------------------------------------------------------

#[test]
fn test_mixed_document() {
    let doc = XmlDocument::parse(concat!(
        "<a id=\"x\">",
        "<b>one</b><!--c1--><b>two<i/></b>",
        "<?go fast?><c/><!--c2--><?go slow?><?stop?>",
        "</a>",
    ))
    .unwrap();
    assert_eq!(
        all_paths(&doc),
        vec![
            "/",
            "/a",
            "/a/@id",
            "/a/b[1]",
            "/a/b[1]/text()",
            "/a/comment()[1]",
            "/a/b[2]",
            "/a/b[2]/text()",
            "/a/b[2]/i",
            "/a/processing-instruction('go')[1]",
            "/a/c",
            "/a/comment()[2]",
            "/a/processing-instruction('go')[2]",
            "/a/processing-instruction('stop')",
        ]
    );
}

#[test]
fn test_text_split_by_elements() {
    let doc = XmlDocument::parse("<p>alpha<br/>beta<![CDATA[gamma]]></p>").unwrap();
    let p = doc.root().unwrap().unwrap();
    let paths: Vec<String> = doc
        .children(&p)
        .unwrap()
        .iter()
        .map(|n| doc.path(n).unwrap())
        .collect();
    assert_eq!(
        paths,
        vec!["/p/text()[1]", "/p/br", "/p/text()[2]", "/p/text()[3]"]
    );
}

#[test]
fn test_default_namespace_uses_wildcards() {
    let doc = XmlDocument::parse(concat!(
        "<feed xmlns=\"urn:atom\" xmlns:m=\"urn:m\">",
        "<entry/><m:meta/><entry/>",
        "</feed>",
    ))
    .unwrap();
    let paths = all_paths(&doc);
    assert!(paths.contains(&"/*".to_string()));
    assert!(paths.contains(&"/*/*[1]".to_string()));
    assert!(paths.contains(&"/*/m:meta".to_string()));
    assert!(paths.contains(&"/*/*[3]".to_string()));
}

#[test]
fn test_html_paths() {
    let doc = XmlDocument::parse_html("<ul><li>a<li>b<li>c</ul>").unwrap();
    let ul = doc.root().unwrap().unwrap();
    let items = doc.children(&ul).unwrap();
    assert_eq!(doc.path(&items[2]).unwrap(), "/ul/li[3]");
}

#[test]
fn test_path_of_foreign_node_fails() {
    let a = XmlDocument::parse("<r/>").unwrap();
    let b = XmlDocument::parse("<r/>").unwrap();
    let foreign = b.root().unwrap().unwrap();
    assert!(a.path(&foreign).is_err());
}

// ---------------------------------------------------------------------------
// Property: every path is distinct within a document
// ---------------------------------------------------------------------------

fn markup() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        "[a-z]{1,4}",
        "[a-c]".prop_map(|n| format!("<{n}/>")),
        "[a-z]{0,3}".prop_map(|c| format!("<!--{c}-->")),
        "[a-b]".prop_map(|t| format!("<?{t} d?>")),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        ("[a-c]", prop::collection::vec(inner, 0..5))
            .prop_map(|(name, kids)| format!("<{name}>{}</{name}>", kids.concat()))
    })
    .prop_map(|body| format!("<root>{body}</root>"))
}

proptest! {
    #[test]
    fn prop_paths_are_unique(xml in markup()) {
        let doc = XmlDocument::parse(&xml).unwrap();
        let paths = all_paths(&doc);
        let mut sorted = paths.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(sorted.len(), paths.len());
    }
}
