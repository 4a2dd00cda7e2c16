//! Plain-text rendering of a cart snapshot.
//!
//! ```text
//! Cart: 3 items
//!   2 x Book                $10.99    $21.98
//!   1 x Computer         $1,199.00 $1,199.00
//! Total: $1,220.98
//! ```
//!
//! Without a catalog, lines show the product id and no prices.

use std::fmt::Write;

use tote_core::{format_currency, CartSnapshot, Catalog};

pub fn render_cart(snapshot: &CartSnapshot, catalog: Option<&Catalog>) -> String {
    let mut out = String::new();

    if snapshot.cart_items.is_empty() {
        out.push_str("Cart is empty\n");
        return out;
    }

    let unit = if snapshot.cart_quantity == 1 { "item" } else { "items" };
    let _ = writeln!(out, "Cart: {} {unit}", snapshot.cart_quantity);

    let mut total = 0.0;
    let mut priced = false;

    for item in &snapshot.cart_items {
        match catalog.and_then(|c| c.get(item.id)) {
            Some(product) => {
                let line_total = product.price * f64::from(item.quantity());
                total += line_total;
                priced = true;
                let _ = writeln!(
                    out,
                    "  {} x {:<16} {:>10} {:>10}",
                    item.quantity(),
                    product.name,
                    format_currency(product.price),
                    format_currency(line_total)
                );
            }
            None => {
                let _ = writeln!(out, "  {} x #{}", item.quantity(), item.id);
            }
        }
    }

    if priced {
        let _ = writeln!(out, "Total: {}", format_currency(total));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tote_core::Cart;

    fn snapshot(items: &str) -> CartSnapshot {
        let cart: Cart = serde_json::from_str(items).unwrap();
        CartSnapshot::new(cart, false)
    }

    fn catalog() -> Catalog {
        Catalog::from_json(
            r#"[
                {"id":1,"name":"Book","price":10.99,"imgUrl":"/imgs/book.jpg"},
                {"id":2,"name":"Computer","price":1199,"imgUrl":"/imgs/computer.jpg"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_cart() {
        assert_eq!(render_cart(&CartSnapshot::default(), None), "Cart is empty\n");
    }

    #[test]
    fn test_lines_without_catalog() {
        let out = render_cart(&snapshot(r#"[{"id":7,"quantity":2}]"#), None);
        assert_eq!(out, "Cart: 2 items\n  2 x #7\n");
    }

    #[test]
    fn test_lines_with_prices_and_total() {
        let catalog = catalog();
        let out = render_cart(
            &snapshot(r#"[{"id":1,"quantity":2},{"id":2,"quantity":1}]"#),
            Some(&catalog),
        );

        assert!(out.starts_with("Cart: 3 items\n"));
        assert!(out.contains("Book"));
        assert!(out.contains("$21.98"));
        assert!(out.contains("$1,199.00"));
        assert!(out.ends_with("Total: $1,220.98\n"));
    }

    #[test]
    fn test_single_item_wording() {
        let out = render_cart(&snapshot(r#"[{"id":1,"quantity":1}]"#), None);
        assert!(out.starts_with("Cart: 1 item\n"));
    }
}
