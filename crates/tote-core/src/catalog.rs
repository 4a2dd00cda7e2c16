//! # Catalog Descriptors
//!
//! Product descriptors consumed by the presentation layer.
//!
//! The cart never looks at name or price; it only stores ids. These types
//! exist so consumers can render lines and so catalog ids can be checked
//! before they reach the store.
//!
//! ## Catalog JSON
//! ```json
//! [
//!   { "id": 1, "name": "Book", "price": 10.99, "imgUrl": "/imgs/book.jpg" },
//!   { "id": 2, "name": "Computer", "price": 1199, "imgUrl": "/imgs/computer.jpg" }
//! ]
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::item::ProductId;

/// One product on offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StoreItem {
    pub id: ProductId,
    pub name: String,
    /// Unit price in dollars, as the catalog provides it.
    pub price: f64,
    pub img_url: String,
}

/// Ordered product list with lookup by id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<StoreItem>,
    index: HashMap<ProductId, usize>,
}

impl Catalog {
    /// Builds a catalog, rejecting duplicate ids.
    pub fn new(items: Vec<StoreItem>) -> CoreResult<Self> {
        let mut index = HashMap::with_capacity(items.len());
        for (pos, item) in items.iter().enumerate() {
            if index.insert(item.id, pos).is_some() {
                return Err(CoreError::DuplicateCatalogEntry(item.id));
            }
        }
        Ok(Catalog { items, index })
    }

    /// Parses a JSON array of store items.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let items: Vec<StoreItem> = serde_json::from_str(json)?;
        Self::new(items)
    }

    pub fn get(&self, id: ProductId) -> Option<&StoreItem> {
        self.index.get(&id).and_then(|&pos| self.items.get(pos))
    }

    pub fn contains(&self, id: ProductId) -> bool {
        self.index.contains_key(&id)
    }

    /// Items in catalog order.
    pub fn iter(&self) -> std::slice::Iter<'_, StoreItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Formats a dollar amount for display, e.g. `1199.5` → `"$1,199.50"`.
///
/// Display only. Nothing in the cart computes with prices.
pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (pos, ch) in whole.chars().enumerate() {
        if pos > 0 && (whole.len() - pos) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}${grouped}.{frac:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEMS: &str = r#"[
        { "id": 1, "name": "Book", "price": 10.99, "imgUrl": "/imgs/book.jpg" },
        { "id": 2, "name": "Computer", "price": 1199, "imgUrl": "/imgs/computer.jpg" },
        { "id": 3, "name": "Banana", "price": 1.05, "imgUrl": "/imgs/banana.jpg" }
    ]"#;

    #[test]
    fn test_from_json_and_lookup() {
        let catalog = Catalog::from_json(ITEMS).unwrap();
        assert_eq!(catalog.len(), 3);

        let computer = catalog.get(ProductId(2)).unwrap();
        assert_eq!(computer.name, "Computer");
        assert_eq!(computer.img_url, "/imgs/computer.jpg");
        assert!(catalog.get(ProductId(42)).is_none());
        assert!(catalog.contains(ProductId(3)));
    }

    #[test]
    fn test_catalog_order_preserved() {
        let catalog = Catalog::from_json(ITEMS).unwrap();
        let names: Vec<&str> = catalog.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Book", "Computer", "Banana"]);
    }

    #[test]
    fn test_duplicate_catalog_ids() {
        let json = r#"[
            { "id": 1, "name": "A", "price": 1, "imgUrl": "a" },
            { "id": 1, "name": "B", "price": 2, "imgUrl": "b" }
        ]"#;
        let err = Catalog::from_json(json).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateCatalogEntry(ProductId(1))));
    }

    #[test]
    fn test_malformed_catalog() {
        assert!(matches!(
            Catalog::from_json("{not json"),
            Err(CoreError::CatalogParse(_))
        ));
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(10.99), "$10.99");
        assert_eq!(format_currency(1199.0), "$1,199.00");
        assert_eq!(format_currency(1234567.891), "$1,234,567.89");
        assert_eq!(format_currency(-5.5), "-$5.50");
    }
}
