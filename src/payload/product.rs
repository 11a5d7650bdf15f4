use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of the `products/*` topics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    pub id: i64,
    pub admin_graphql_api_id: Option<String>,
    pub title: String,
    pub handle: String,
    pub body_html: Option<String>,
    pub vendor: Option<String>,
    pub product_type: Option<String>,
    pub status: Option<String>,
    pub tags: String,
    pub template_suffix: Option<String>,
    pub variants: Vec<Variant>,
    pub images: Vec<Image>,
    pub options: Vec<ProductOption>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Variant {
    pub id: i64,
    pub product_id: i64,
    pub title: String,
    pub price: String,
    pub compare_at_price: Option<String>,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub position: i64,
    pub grams: i64,
    pub weight: f64,
    pub weight_unit: Option<String>,
    pub inventory_item_id: Option<i64>,
    pub inventory_quantity: i64,
    pub inventory_management: Option<String>,
    pub inventory_policy: Option<String>,
    pub fulfillment_service: Option<String>,
    pub option1: Option<String>,
    pub option2: Option<String>,
    pub option3: Option<String>,
    pub taxable: bool,
    pub requires_shipping: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Image {
    pub id: i64,
    pub product_id: i64,
    pub position: i64,
    pub src: String,
    pub alt: Option<String>,
    pub width: i64,
    pub height: i64,
    pub variant_ids: Vec<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A product option such as size or color.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductOption {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    pub position: i64,
    pub values: Vec<String>,
}

/// Payload of the `collections/*` topics, custom and smart collections alike.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Collection {
    pub id: i64,
    pub admin_graphql_api_id: Option<String>,
    pub title: String,
    pub handle: String,
    pub body_html: Option<String>,
    pub sort_order: Option<String>,
    pub template_suffix: Option<String>,
    pub published_scope: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
}
