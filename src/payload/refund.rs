use super::common::LineItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of `refunds/create`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Refund {
    pub id: i64,
    pub order_id: i64,
    pub note: Option<String>,
    pub restock: bool,
    pub user_id: Option<i64>,
    pub refund_line_items: Vec<RefundLineItem>,
    pub transactions: Vec<Transaction>,
    pub order_adjustments: Vec<OrderAdjustment>,
    pub created_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefundLineItem {
    pub id: i64,
    pub line_item_id: i64,
    pub quantity: i64,
    pub subtotal: String,
    pub total_tax: String,
    pub line_item: LineItem,
}

/// Payment transaction attached to a refund.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transaction {
    pub id: i64,
    pub order_id: i64,
    pub kind: String,
    pub gateway: Option<String>,
    pub status: Option<String>,
    pub amount: String,
    pub currency: Option<String>,
    pub authorization: Option<String>,
    pub error_code: Option<String>,
    pub message: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Refund adjustment such as a shipping refund.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderAdjustment {
    pub id: i64,
    pub order_id: i64,
    pub refund_id: i64,
    pub amount: String,
    pub tax_amount: String,
    pub kind: String,
    pub reason: Option<String>,
}
