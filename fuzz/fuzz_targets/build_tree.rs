#![no_main]

use libfuzzer_sys::fuzz_target;
use trellis_core::WorkItemRecord;
use trellis_core::tree::{build_tree_with_report, flatten};

fuzz_target!(|data: &[u8]| {
    let Ok(records) = serde_json::from_slice::<Vec<WorkItemRecord>>(data) else {
        return;
    };
    let total = records.len();
    let build = build_tree_with_report(records);

    // No id is placed twice and nothing is invented.
    let placed = flatten(&build.roots);
    assert!(placed.len() + build.skipped.len() <= total);
    let mut seen = std::collections::HashSet::new();
    for entry in &placed {
        assert!(seen.insert(entry.id.clone()), "id placed twice: {}", entry.id);
    }
});
