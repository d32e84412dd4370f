//! Serialization tests: exact output of both dialects and parse/serialize
//! round trips.

#![allow(clippy::unwrap_used)]

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use xmlfacade::parser::ParseOptions;
use xmlfacade::tree::{Document, NodeId, NodeKind, NodeType};
use xmlfacade::{Error, SaveOptions, XmlDocument};

fn bare() -> SaveOptions {
    SaveOptions::default().no_declaration(true)
}

// ---------------------------------------------------------------------------
// XML dialect
// ---------------------------------------------------------------------------

#[test]
fn test_default_prolog() {
    let doc = XmlDocument::parse("<r/>").unwrap();
    assert_eq!(
        doc.serialize().unwrap(),
        "<?xml version=\"1.0\" standalone=\"no\"?>\n<r/>\n"
    );
}

#[test]
fn test_empty_element_styles() {
    let doc = XmlDocument::parse("<tag/>").unwrap();
    assert_eq!(doc.serialize_with_options(&bare()).unwrap(), "<tag/>\n");
    assert_eq!(
        doc.serialize_with_options(&bare().no_empty_tags(true)).unwrap(),
        "<tag></tag>\n"
    );
}

#[test]
fn test_text_escaping() {
    let doc = XmlDocument::parse("<t a=\"x&amp;y&lt;z\">&amp; &lt; &gt; &#13; \"q\"</t>").unwrap();
    assert_eq!(
        doc.serialize_with_options(&bare()).unwrap(),
        "<t a=\"x&amp;y&lt;z\">&amp; &lt; &gt; &#13; \"q\"</t>\n"
    );
}

#[test]
fn test_formatted_nesting() {
    let doc = XmlDocument::parse(
        "<catalog><book id=\"1\"><title>T</title><tags><tag/><tag/></tags></book></catalog>",
    )
    .unwrap();
    let out = doc.serialize_with_options(&bare().format(true)).unwrap();
    assert_eq!(
        out,
        "<catalog>\n  <book id=\"1\">\n    <title>T</title>\n    <tags>\n      <tag/>\n      <tag/>\n    </tags>\n  </book>\n</catalog>\n"
    );
}

#[test]
fn test_blank_text_keeps_subtree_unformatted() {
    let input = "<r>\n  <a/>\n</r>";
    let doc = XmlDocument::parse(input).unwrap();
    let out = doc.serialize_with_options(&bare().format(true)).unwrap();
    assert_eq!(out, format!("{input}\n"));

    let opts = ParseOptions::default().no_blanks(true);
    let doc = XmlDocument::parse_with_options(input, &opts).unwrap();
    let out = doc.serialize_with_options(&bare().format(true)).unwrap();
    assert_eq!(out, "<r>\n  <a/>\n</r>\n");
}

#[test]
fn test_from_bits_options() {
    let doc = XmlDocument::parse("<r><e/></r>").unwrap();
    let bits = SaveOptions::NO_DECLARATION | SaveOptions::NO_EMPTY_TAGS;
    assert_eq!(
        doc.serialize_with_options(&SaveOptions::from_bits(bits)).unwrap(),
        "<r><e></e></r>\n"
    );
    let bits = SaveOptions::AS_HTML;
    assert_eq!(
        doc.serialize_with_options(&SaveOptions::from_bits(bits)).unwrap(),
        "<r><e></e></r>\n"
    );
}

#[test]
fn test_standalone_and_version_carried() {
    let doc =
        XmlDocument::parse("<?xml version=\"1.1\" standalone=\"yes\"?><r/>").unwrap();
    assert_eq!(
        doc.serialize().unwrap(),
        "<?xml version=\"1.1\" standalone=\"yes\"?>\n<r/>\n"
    );
}

#[test]
fn test_missing_root_is_error() {
    let doc = XmlDocument::new(Document::new());
    assert!(matches!(doc.serialize(), Err(Error::MissingRoot)));
    // the document node alone also needs a root in the XML dialect
    let node = doc.document_node().unwrap();
    assert!(matches!(
        doc.serialize_node(&node, &SaveOptions::default()),
        Err(Error::MissingRoot)
    ));
}

#[test]
fn test_serialize_to_bytes_latin1() {
    let doc = XmlDocument::parse("<r>caf\u{e9}</r>").unwrap();
    let bytes = doc
        .serialize_to_bytes(&bare().encoding("ISO-8859-1"))
        .unwrap();
    assert_eq!(bytes, b"<r>caf\xe9</r>\n");

    let with_prolog = doc
        .serialize_to_bytes(&SaveOptions::default().encoding("ISO-8859-1"))
        .unwrap();
    assert!(with_prolog.starts_with(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\""));
}

#[test]
fn test_serialize_to_bytes_unrepresentable() {
    let doc = XmlDocument::parse("<r>\u{4e2d}</r>").unwrap();
    assert!(matches!(
        doc.serialize_to_bytes(&bare().encoding("ISO-8859-1")),
        Err(Error::Encoding(_))
    ));
}

// ---------------------------------------------------------------------------
// HTML dialect
// ---------------------------------------------------------------------------

#[test]
fn test_html_page() {
    let doc = XmlDocument::parse_html(
        "<!DOCTYPE html><html><head><title>T</title></head><body><p class=\"a&b\">x<br>y</p></body></html>",
    )
    .unwrap();
    assert_eq!(
        doc.serialize().unwrap(),
        "<!DOCTYPE html>\n<html><head><title>T</title></head><body><p class=\"a&b\">x<br></br>y</p></body></html>\n"
    );
}

#[test]
fn test_html_format() {
    let doc = XmlDocument::parse_html("<html><head></head><body><div></div><div></div></body></html>")
        .unwrap();
    let out = doc.serialize_with_options(&SaveOptions::default().format(true)).unwrap();
    assert_eq!(
        out,
        "<html><head></head>\n<body><div></div>\n<div></div></body></html>\n"
    );
}

#[test]
fn test_serialize_goes_through_wrappers() {
    let doc = XmlDocument::parse("<r a=\"1\"><b>t</b></r>").unwrap();
    let root = doc.root().unwrap().unwrap();
    doc.serialize().unwrap();
    // document, r, @a, b, text
    assert_eq!(doc.cache().len(), 5);
    assert!(doc.cache().get(root.id()).unwrap().ptr_eq(&root));

    let html = XmlDocument::parse_html("<p>x<br></p>").unwrap();
    assert!(html.cache().is_empty());
    html.serialize().unwrap();
    assert_eq!(html.cache().len(), 4);
}

#[test]
fn test_html_as_xml() {
    let doc = XmlDocument::parse_html("<p>a<br>b</p>").unwrap();
    let out = doc.serialize_with_options(&bare().html(false)).unwrap();
    assert_eq!(out, "<p>a<br/>b</p>\n");
}

// ---------------------------------------------------------------------------
// Round trips
// ---------------------------------------------------------------------------

/// Element names, attribute sets and text, in document order.
fn shape(doc: &Document) -> Vec<String> {
    doc.descendants(doc.root())
        .filter_map(|id: NodeId| match doc.node_type(id) {
            NodeType::Element => {
                let mut attrs: Vec<String> = doc
                    .attributes(id)
                    .iter()
                    .map(|&a| {
                        format!(
                            "{}={}",
                            doc.qualified_name(a).unwrap(),
                            doc.node_text(a).unwrap()
                        )
                    })
                    .collect();
                attrs.sort();
                Some(format!("<{} {}>", doc.qualified_name(id).unwrap(), attrs.join(" ")))
            }
            NodeType::Text | NodeType::CData => Some(doc.node_text(id).unwrap().to_string()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_round_trip_fixed() {
    let input = r#"<?xml version="1.0" encoding="UTF-8"?>
<p:root xmlns:p="urn:p" p:a="1" b="x &amp; &lt;y&gt;">
  <p:item>one</p:item>
  <item><![CDATA[raw <b>]]></item>
  <!-- note --><?pi data?>
</p:root>"#;
    let first = XmlDocument::parse(input).unwrap();
    let out = first.serialize().unwrap();
    let second = XmlDocument::parse(&out).unwrap();
    assert_eq!(shape(first.tree()), shape(second.tree()));
}

fn text_strategy() -> impl Strategy<Value = String> {
    "[a-z &<>\"']{1,12}"
}

/// Double quotes are written unescaped, so attribute values avoid them.
fn value_strategy() -> impl Strategy<Value = String> {
    "[a-z &<>']{0,8}"
}

fn xml_strategy() -> impl Strategy<Value = Document> {
    let attrs = || prop::collection::btree_map("[e-h]{1,3}", value_strategy(), 0..3);
    let leaf = prop_oneof![
        text_strategy().prop_map(Item::Text),
        ("[a-d]{1,3}", attrs())
            .prop_map(|(n, a)| Item::Element(n, a.into_iter().collect(), vec![])),
    ];
    let tree = leaf.prop_recursive(4, 40, 4, move |inner| {
        ("[a-d]{1,3}", attrs(), prop::collection::vec(inner, 0..4))
            .prop_map(|(n, a, kids)| Item::Element(n, a.into_iter().collect(), kids))
    });
    tree.prop_map(|item| {
        let mut doc = Document::new();
        let root = doc.root();
        let element = doc.create_node(NodeKind::Element {
            name: "root".to_string(),
            prefix: None,
            namespace: None,
            attributes: Vec::new(),
        });
        doc.append_child(root, element);
        build(&mut doc, element, &item);
        doc
    })
}

#[derive(Debug, Clone)]
enum Item {
    Text(String),
    Element(String, Vec<(String, String)>, Vec<Item>),
}

fn build(doc: &mut Document, parent: NodeId, item: &Item) {
    match item {
        Item::Text(text) => {
            // adjacent text would merge when parsed back
            let after_text = doc
                .last_child(parent)
                .is_some_and(|last| doc.node_type(last) == NodeType::Text);
            if !after_text {
                let node = doc.create_node(NodeKind::Text {
                    content: text.clone(),
                });
                doc.append_child(parent, node);
            }
        }
        Item::Element(name, attrs, kids) => {
            let node = doc.create_node(NodeKind::Element {
                name: name.clone(),
                prefix: None,
                namespace: None,
                attributes: Vec::new(),
            });
            doc.append_child(parent, node);
            for (k, v) in attrs {
                doc.add_attribute(node, k, None, None, v);
            }
            for kid in kids {
                build(doc, node, kid);
            }
        }
    }
}

proptest! {
    #[test]
    fn prop_serialize_then_parse_preserves_shape(tree in xml_strategy()) {
        let doc = XmlDocument::new(tree);
        let out = doc.serialize().unwrap();
        let back = XmlDocument::parse(&out).unwrap();
        prop_assert_eq!(shape(doc.tree()), shape(back.tree()));
    }
}
