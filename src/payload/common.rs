//! Shapes shared by several payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mailing address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub province_code: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub zip: Option<String>,
    pub phone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItem {
    pub id: i64,
    pub product_id: Option<i64>,
    pub variant_id: Option<i64>,
    pub title: String,
    pub variant_title: Option<String>,
    pub quantity: i64,
    pub price: String,
    pub sku: Option<String>,
    pub vendor: Option<String>,
    pub grams: i64,
    pub taxable: bool,
    pub requires_shipping: bool,
    pub gift_card: bool,
    pub fulfillment_status: Option<String>,
    pub tax_lines: Vec<TaxLine>,
    pub properties: Vec<NoteAttribute>,
    pub discount_allocations: Vec<DiscountAllocation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingLine {
    pub id: i64,
    pub title: String,
    pub price: String,
    pub code: Option<String>,
    pub source: Option<String>,
    pub tax_lines: Vec<TaxLine>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxLine {
    pub title: String,
    pub price: String,
    pub rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscountCode {
    pub code: String,
    pub amount: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Share of a discount applied to one line item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscountAllocation {
    pub amount: String,
    pub discount_application_index: i64,
}

/// Free-form key/value attached to an order or line item. The value may be
/// any JSON type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteAttribute {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fulfillment {
    pub id: i64,
    pub order_id: i64,
    pub status: Option<String>,
    pub tracking_company: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_numbers: Vec<String>,
    pub tracking_url: Option<String>,
    pub tracking_urls: Vec<String>,
    pub line_items: Vec<LineItem>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
