//! Identity matcher.
//!
//! Levels are checked top-down and the first satisfied level wins. A level is
//! only considered when the target carries every component it compares, so a
//! target with just a `product_id` can never produce anything more specific
//! than [`MatchLevel::ProductOnly`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{ProductRecord, TargetIdentity};

/// Specificity of a match, most specific first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchLevel {
    Full = 1,
    ProductVendor = 2,
    ProductItem = 3,
    ProductOnly = 4,
    VendorOnly = 5,
    ItemOnly = 6,
}

impl MatchLevel {
    /// 1 is the most specific
    pub fn priority(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::ProductVendor => "product_vendor",
            Self::ProductItem => "product_item",
            Self::ProductOnly => "product_only",
            Self::VendorOnly => "vendor_only",
            Self::ItemOnly => "item_only",
        }
    }
}

impl fmt::Display for MatchLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn same(candidate: Option<&str>, wanted: &str) -> bool {
    candidate == Some(wanted)
}

/// Match one scanned product against the target identity
pub fn match_product(product: &ProductRecord, target: &TargetIdentity) -> Option<MatchLevel> {
    let product_eq = product.product_id == target.product_id;
    let item = target.item_id.as_deref();
    let vendor = target.vendor_item_id.as_deref();
    let item_eq = item.map(|wanted| same(product.item_id.as_deref(), wanted));
    let vendor_eq = vendor.map(|wanted| same(product.vendor_item_id.as_deref(), wanted));

    if product_eq && item_eq == Some(true) && vendor_eq == Some(true) {
        return Some(MatchLevel::Full);
    }
    if product_eq && vendor_eq == Some(true) {
        return Some(MatchLevel::ProductVendor);
    }
    if product_eq && item_eq == Some(true) {
        return Some(MatchLevel::ProductItem);
    }
    if product_eq {
        return Some(MatchLevel::ProductOnly);
    }
    if vendor_eq == Some(true) {
        return Some(MatchLevel::VendorOnly);
    }
    if item_eq == Some(true) {
        return Some(MatchLevel::ItemOnly);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> ProductRecord {
        ProductRecord::new("100", 1, 1)
            .with_item_id("200")
            .with_vendor_item_id("300")
    }

    fn target(item: Option<&str>, vendor: Option<&str>) -> TargetIdentity {
        let mut target = TargetIdentity::new("100").unwrap();
        if let Some(item) = item {
            target = target.with_item_id(item);
        }
        if let Some(vendor) = vendor {
            target = target.with_vendor_item_id(vendor);
        }
        target
    }

    #[test]
    fn test_full_match() {
        let level = match_product(&product(), &target(Some("200"), Some("300")));
        assert_eq!(level, Some(MatchLevel::Full));
    }

    #[test]
    fn test_falls_through_to_less_specific_levels() {
        assert_eq!(
            match_product(&product(), &target(Some("999"), Some("300"))),
            Some(MatchLevel::ProductVendor)
        );
        assert_eq!(
            match_product(&product(), &target(Some("200"), Some("999"))),
            Some(MatchLevel::ProductItem)
        );
        assert_eq!(
            match_product(&product(), &target(Some("999"), Some("999"))),
            Some(MatchLevel::ProductOnly)
        );
    }

    #[test]
    fn test_product_only_target() {
        assert_eq!(
            match_product(&product(), &target(None, None)),
            Some(MatchLevel::ProductOnly)
        );
    }

    #[test]
    fn test_secondary_identifiers_without_product() {
        let other = ProductRecord::new("555", 1, 1)
            .with_item_id("200")
            .with_vendor_item_id("300");
        assert_eq!(
            match_product(&other, &target(Some("200"), Some("300"))),
            Some(MatchLevel::VendorOnly)
        );
        assert_eq!(
            match_product(&other, &target(Some("200"), None)),
            Some(MatchLevel::ItemOnly)
        );
        assert_eq!(match_product(&other, &target(None, None)), None);
    }

    #[test]
    fn test_missing_product_component_never_matches_present_target_component() {
        let bare = ProductRecord::new("555", 1, 1);
        assert_eq!(match_product(&bare, &target(Some("200"), Some("300"))), None);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(MatchLevel::Full < MatchLevel::ItemOnly);
        assert_eq!(MatchLevel::Full.priority(), 1);
        assert_eq!(MatchLevel::ItemOnly.priority(), 6);
        assert_eq!(MatchLevel::ProductOnly.to_string(), "product_only");
    }
}
