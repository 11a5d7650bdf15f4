//! Webhook payload schemas.
//!
//! Plain serde shapes for the common topics, decoded on demand with
//! [`Event::decode`](crate::Event::decode). Every struct tolerates missing
//! fields; values the platform sends as `null` are `Option`s. Monetary
//! amounts stay decimal strings, as sent.

mod cart;
mod common;
mod customer;
mod order;
mod product;
mod refund;

pub use cart::{Cart, CartLineItem, Checkout};
pub use common::{
    Address, DiscountAllocation, DiscountCode, Fulfillment, LineItem, NoteAttribute,
    ShippingLine, TaxLine,
};
pub use customer::{Customer, CustomerAddress};
pub use order::Order;
pub use product::{Collection, Image, Product, ProductOption, Variant};
pub use refund::{OrderAdjustment, Refund, RefundLineItem, Transaction};
