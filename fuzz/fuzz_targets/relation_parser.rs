//! Fuzz target for the relation path parser.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_relation_parser
//! ```

#![no_main]

use graft_loader::Relations;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Parsing never panics, and the canonical form parses back to itself
        if let Ok(relations) = Relations::parse(input) {
            let canonical = relations.to_string();
            if let Ok(again) = Relations::parse(&canonical) {
                assert_eq!(again, relations);
            }
            for field in relations.fields() {
                let _ = relations.nested(field);
            }
        }
    }
});
