//! Dense rank assignment over every product scanned in a search.

use std::collections::HashSet;

use crate::models::ProductRecord;

/// A scanned product with its position in the merged ordering
#[derive(Debug, Clone, PartialEq)]
pub struct RankedProduct {
    pub rank: u32,
    pub product: ProductRecord,
}

/// Sort by `(page, position_on_page)`, drop repeated unique keys (first
/// occurrence wins) and number the survivors 1..N.
///
/// The source's own rank values are ignored.
pub fn assign_ranks(products: &[ProductRecord]) -> Vec<RankedProduct> {
    let mut ordered: Vec<&ProductRecord> = products.iter().collect();
    ordered.sort_by_key(|p| (p.page, p.position_on_page));

    let mut seen = HashSet::new();
    ordered
        .into_iter()
        .filter(|p| seen.insert(p.unique_key()))
        .zip(1..)
        .map(|(product, rank)| RankedProduct {
            rank,
            product: product.clone(),
        })
        .collect()
}
