//! Shopping cart held by the customer's browser session.
//!
//! Quantities never exceed the stock the product had when it was added, and
//! line prices apply the product's percentage discount.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A product line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(rename = "id")]
    pub product_id: String,
    pub product_name: String,
    pub image_url: Option<String>,
    pub selling_price: Decimal,
    pub discount_percent: Option<Decimal>,
    pub quantity: u32,
    pub product_code: String,
    pub stock: u32,
}

impl CartItem {
    /// Price of one unit after the percentage discount.
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        let discount = self
            .discount_percent
            .filter(|pct| !pct.is_zero())
            .map_or(Decimal::ZERO, |pct| self.selling_price * pct / Decimal::ONE_HUNDRED);
        self.selling_price - discount
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price() * Decimal::from(self.quantity)
    }
}

/// The customer's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add `quantity` units of a product.
    ///
    /// An existing line for the same product is topped up; either way the
    /// resulting quantity is capped at `product.stock`.
    pub fn add_item(&mut self, product: CartItem, quantity: u32) {
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|item| item.product_id == product.product_id)
        {
            existing.quantity = existing.quantity.saturating_add(quantity).min(product.stock);
            return;
        }

        let quantity = quantity.min(product.stock);
        self.items.push(CartItem { quantity, ..product });
    }

    /// Drop a product line.
    pub fn remove_item(&mut self, product_id: &str) {
        self.items.retain(|item| item.product_id != product_id);
    }

    /// Set a line's quantity, clamped to `[1, stock]`.
    pub fn update_quantity(&mut self, product_id: &str, quantity: u32) {
        if let Some(item) = self
            .items
            .iter_mut()
            .find(|item| item.product_id == product_id)
        {
            item.quantity = quantity.max(1).min(item.stock);
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Units across all lines.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Discounted sum of all lines.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }
}
