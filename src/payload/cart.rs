use super::common::{Address, DiscountCode, LineItem, NoteAttribute, ShippingLine, TaxLine};
use super::customer::Customer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of the `carts/*` topics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cart {
    pub id: String,
    pub token: String,
    pub note: Option<String>,
    pub line_items: Vec<CartLineItem>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartLineItem {
    pub id: i64,
    pub product_id: i64,
    pub variant_id: i64,
    pub title: String,
    pub quantity: i64,
    pub price: String,
    pub sku: Option<String>,
    pub grams: i64,
    pub vendor: Option<String>,
    pub properties: Vec<NoteAttribute>,
}

/// Payload of the `checkouts/*` topics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Checkout {
    pub id: i64,
    pub token: String,
    pub cart_token: Option<String>,
    pub email: Option<String>,
    pub gateway: Option<String>,
    pub total_price: String,
    pub subtotal_price: String,
    pub total_tax: String,
    pub total_discounts: String,
    pub total_weight: i64,
    pub currency: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub phone: Option<String>,
    pub customer_locale: Option<String>,
    pub landing_site: Option<String>,
    pub referring_site: Option<String>,
    pub source_name: Option<String>,
    pub buyer_accepts_marketing: bool,
    pub taxes_included: bool,
    pub customer: Option<Customer>,
    pub line_items: Vec<LineItem>,
    pub shipping_line: Option<ShippingLine>,
    pub billing_address: Option<Address>,
    pub shipping_address: Option<Address>,
    pub discount_codes: Vec<DiscountCode>,
    pub tax_lines: Vec<TaxLine>,
    pub note_attributes: Vec<NoteAttribute>,
    pub note: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_cart_ignores_unknown_fields() {
        let cart: Cart = serde_json::from_value(json!({
            "id": "eeafa272cebfd4b22385bc4b645e762c",
            "token": "eeafa272cebfd4b22385bc4b645e762c",
            "line_items": [{"id": 704912205188288575i64, "quantity": 3, "price": "19.99", "title": "Mug"}],
            "updated_at": "2025-01-15T10:00:00.000Z",
            "unknown_future_field": {"nested": true}
        }))
        .unwrap();

        assert_eq!(cart.line_items.len(), 1);
        assert_eq!(cart.line_items[0].quantity, 3);
        assert!(cart.note.is_none());
        assert!(cart.updated_at.is_some());
    }
}
