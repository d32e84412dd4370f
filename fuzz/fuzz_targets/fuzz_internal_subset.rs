#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlfacade::dtd::Declarations;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // malformed subsets end up in parse_error, never in a panic
        let decls = Declarations::from_internal_subset(Some(s));
        for decl in decls.all() {
            let _ = decl.name();
        }
    }
});
