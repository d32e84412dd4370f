#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlfacade::{SaveOptions, XmlDocument};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(doc) = XmlDocument::parse_html(s) {
            let _ = doc.serialize_with_options(&SaveOptions::default().format(true));
        }
    }
});
