//! Cart entity model.
//!
//! Pure data, no behavior beyond lookup helpers. Invariants the
//! repositories maintain:
//!
//! - `items` has at most one entry per SKU id (the identity key)
//! - no persisted item ever has `quantity == 0`; reducing a quantity to
//!   zero or below removes the item
//! - `subtotal`/`total` are authoritative only when they came from the
//!   remote backend; the local variant reports zero until pricing is
//!   available externally

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use varejo_core::{CartId, ProductId, SkuId};

use crate::clients::SkuDetails;

/// A shopping cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    /// Cart id (backend-minted or locally generated for guests).
    pub id: CartId,
    /// Line items, at most one per SKU.
    pub items: Vec<CartItem>,
    /// Subtotal before shipping.
    pub subtotal: Decimal,
    /// Total.
    pub total: Decimal,
}

impl Cart {
    /// The canonical empty cart shape.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            id: CartId::new(""),
            items: Vec::new(),
            subtotal: Decimal::ZERO,
            total: Decimal::ZERO,
        }
    }

    /// Find an item by SKU.
    #[must_use]
    pub fn find_item(&self, sku_id: SkuId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.sku_id == sku_id)
    }

    /// Total unit count across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// The subtotal to charge against. Backend totals are authoritative;
    /// a guest cart reports zero, so fall back to summing the enriched
    /// line prices.
    #[must_use]
    pub fn effective_subtotal(&self) -> Decimal {
        if self.subtotal > Decimal::ZERO {
            return self.subtotal;
        }
        self.items
            .iter()
            .filter_map(|item| {
                item.sku
                    .as_ref()
                    .map(|sku| sku.price * Decimal::from(item.quantity))
            })
            .sum()
    }
}

/// A line item in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// SKU id - the item's identity key.
    pub sku_id: SkuId,
    /// Parent product id, when known.
    pub product_id: Option<ProductId>,
    /// Quantity, always > 0 in a persisted cart.
    pub quantity: u32,
    /// Catalog data attached by the enrichment pipeline. Served to
    /// clients but never persisted; `None` when the lookup missed or
    /// hasn't run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<EnrichedSku>,
}

impl CartItem {
    /// A bare item with no enrichment.
    #[must_use]
    pub const fn new(sku_id: SkuId, product_id: Option<ProductId>, quantity: u32) -> Self {
        Self {
            sku_id,
            product_id,
            quantity,
            sku: None,
        }
    }
}

/// Catalog display data for a line item.
pub type EnrichedSku = SkuDetails;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cart_shape() {
        let cart = Cart::empty();
        assert!(cart.items.is_empty());
        assert_eq!(cart.subtotal, Decimal::ZERO);
        assert_eq!(cart.total, Decimal::ZERO);
        assert_eq!(cart.item_count(), 0);
    }

    #[test]
    fn test_find_item() {
        let cart = Cart {
            id: CartId::new("c"),
            items: vec![
                CartItem::new(SkuId::new(1), None, 2),
                CartItem::new(SkuId::new(2), Some(ProductId::new(9)), 1),
            ],
            subtotal: Decimal::ZERO,
            total: Decimal::ZERO,
        };
        assert_eq!(cart.find_item(SkuId::new(2)).map(|i| i.quantity), Some(1));
        assert!(cart.find_item(SkuId::new(3)).is_none());
        assert_eq!(cart.item_count(), 3);
    }
}
