use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of the `customers/*` topics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Customer {
    pub id: i64,
    pub admin_graphql_api_id: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub state: Option<String>,
    pub note: Option<String>,
    pub tags: String,
    pub currency: Option<String>,
    pub tax_exempt: bool,
    pub verified_email: bool,
    pub orders_count: i64,
    pub total_spent: Option<String>,
    pub addresses: Vec<CustomerAddress>,
    pub default_address: Option<CustomerAddress>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerAddress {
    pub id: i64,
    pub customer_id: i64,
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
    pub default: bool,
}
