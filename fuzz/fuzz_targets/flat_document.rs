//! Fuzz target for flat document parsing and reassembly.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_flat_document
//! ```

#![no_main]

use graft_loader::{FlatDocument, Serializer, Store, ingest};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    if let Ok(document) = FlatDocument::from_json(&json) {
        if let Ok(graph) = document.reassemble() {
            let _ = Serializer::detached().to_nested(&graph);
            let _ = Serializer::detached().to_flat(&graph);
        }
    }

    let mut store = Store::new();
    if let Ok(graph) = ingest(&json, &mut store) {
        let _ = Serializer::new(&store).to_flat(&graph);
    }
});
