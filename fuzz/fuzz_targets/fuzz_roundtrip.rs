#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlfacade::parser::ParseOptions;
use xmlfacade::XmlDocument;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let opts = ParseOptions::default().recover(true);
        if let Ok(doc) = XmlDocument::parse_with_options(s, &opts) {
            // serialize -> parse again, and path every node; none may panic
            if let Ok(output) = doc.serialize() {
                let _ = XmlDocument::parse_with_options(&output, &opts);
            }
            let tree = doc.tree();
            for id in tree.descendants(tree.root()) {
                let _ = doc.resolve(Some(id)).map(|node| node.map(|n| doc.path(&n)));
            }
        }
    }
});
