use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::SearchError;

/// Partial identity of the product being searched for. `product_id` is mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetIdentity {
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_item_id: Option<String>,
}

impl TargetIdentity {
    pub fn new(product_id: impl Into<String>) -> Result<Self, SearchError> {
        let product_id = product_id.into().trim().to_string();
        if product_id.is_empty() {
            return Err(SearchError::InvalidInput(
                "product_id is required".to_string(),
            ));
        }
        Ok(Self {
            product_id,
            item_id: None,
            vendor_item_id: None,
        })
    }

    pub fn with_item_id(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = non_blank(item_id.into());
        self
    }

    pub fn with_vendor_item_id(mut self, vendor_item_id: impl Into<String>) -> Self {
        self.vendor_item_id = non_blank(vendor_item_id.into());
        self
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// One product card extracted from a result page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_id: String,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub vendor_item_id: Option<String>,
    /// Result page the record was scanned from
    pub page: u32,
    /// 1-based position within the page
    pub position_on_page: u32,
    #[serde(default)]
    pub is_sponsored: bool,
    /// Display fields (name, price, rating, ...) carried through untouched
    #[serde(default)]
    pub display: HashMap<String, serde_json::Value>,
}

impl ProductRecord {
    pub fn new(product_id: impl Into<String>, page: u32, position_on_page: u32) -> Self {
        Self {
            product_id: product_id.into(),
            item_id: None,
            vendor_item_id: None,
            page,
            position_on_page,
            is_sponsored: false,
            display: HashMap::new(),
        }
    }

    pub fn with_item_id(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    pub fn with_vendor_item_id(mut self, vendor_item_id: impl Into<String>) -> Self {
        self.vendor_item_id = Some(vendor_item_id.into());
        self
    }

    pub fn sponsored(mut self) -> Self {
        self.is_sponsored = true;
        self
    }

    /// `productId_itemId_vendorItemId`, used to de-duplicate across pages
    pub fn unique_key(&self) -> String {
        format!(
            "{}_{}_{}",
            self.product_id,
            self.item_id.as_deref().unwrap_or_default(),
            self.vendor_item_id.as_deref().unwrap_or_default()
        )
    }
}
