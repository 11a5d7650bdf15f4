use super::common::{
    Address, DiscountCode, Fulfillment, LineItem, NoteAttribute, ShippingLine, TaxLine,
};
use super::customer::Customer;
use super::refund::Refund;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of the `orders/*` topics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    pub id: i64,
    pub admin_graphql_api_id: Option<String>,
    pub email: Option<String>,
    pub name: String,
    pub number: i64,
    pub order_number: i64,
    pub note: Option<String>,
    pub token: Option<String>,
    pub gateway: Option<String>,
    pub total_price: String,
    pub subtotal_price: String,
    pub total_tax: String,
    pub total_discounts: String,
    pub total_weight: i64,
    pub currency: String,
    pub financial_status: Option<String>,
    pub fulfillment_status: Option<String>,
    pub confirmed: bool,
    pub test: bool,
    pub cancel_reason: Option<String>,
    pub tags: String,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub browser_ip: Option<String>,
    pub landing_site: Option<String>,
    pub referring_site: Option<String>,
    pub source_name: Option<String>,
    pub customer: Option<Customer>,
    pub line_items: Vec<LineItem>,
    pub shipping_lines: Vec<ShippingLine>,
    pub billing_address: Option<Address>,
    pub shipping_address: Option<Address>,
    pub fulfillments: Vec<Fulfillment>,
    pub refunds: Vec<Refund>,
    pub discount_codes: Vec<DiscountCode>,
    pub note_attributes: Vec<NoteAttribute>,
    pub tax_lines: Vec<TaxLine>,
    pub payment_gateway_names: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled_at.is_some()
    }
}
