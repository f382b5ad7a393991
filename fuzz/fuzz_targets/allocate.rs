#![no_main]

use libfuzzer_sys::fuzz_target;
use trellis_core::config::OrderingConfig;
use trellis_core::order::{SiblingKey, allocate, sort_siblings};

fuzz_target!(|input: (Vec<f64>, u8)| {
    let (orders, index) = input;
    let mut siblings: Vec<SiblingKey> = orders
        .iter()
        .enumerate()
        .map(|(i, order)| SiblingKey {
            id: format!("wi-{i:010}"),
            order: *order,
        })
        .collect();
    sort_siblings(&mut siblings);

    let config = OrderingConfig::default();
    let allocation = allocate(&siblings, usize::from(index), &config);
    assert!(allocation.order.is_finite());
});
