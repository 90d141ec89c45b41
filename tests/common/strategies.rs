use proptest::prelude::*;

use ranker_core::models::{ProductRecord, TargetIdentity};

/// Small id alphabet so generated products collide with targets often
pub fn id_strategy() -> impl Strategy<Value = String> {
    "[1-4]{1,2}"
}

pub fn target_strategy() -> impl Strategy<Value = TargetIdentity> {
    (
        id_strategy(),
        prop::option::of(id_strategy()),
        prop::option::of(id_strategy()),
    )
        .prop_map(|(product_id, item_id, vendor_item_id)| {
            let mut target = TargetIdentity::new(product_id).expect("generated id is non-empty");
            if let Some(item_id) = item_id {
                target = target.with_item_id(item_id);
            }
            if let Some(vendor_item_id) = vendor_item_id {
                target = target.with_vendor_item_id(vendor_item_id);
            }
            target
        })
}

pub fn product_strategy() -> impl Strategy<Value = ProductRecord> {
    (
        id_strategy(),
        prop::option::of(id_strategy()),
        prop::option::of(id_strategy()),
        1u32..=13,
        1u32..=72,
    )
        .prop_map(|(product_id, item_id, vendor_item_id, page, position)| {
            let mut product = ProductRecord::new(product_id, page, position);
            product.item_id = item_id;
            product.vendor_item_id = vendor_item_id;
            product
        })
}

/// A scanned result set, possibly with repeated cards
pub fn scan_strategy() -> impl Strategy<Value = Vec<ProductRecord>> {
    prop::collection::vec(product_strategy(), 0..120)
}
