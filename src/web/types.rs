//! Request and response DTOs for the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{
    CustomerRecord, InvoiceItemRecord, InvoiceProductRecord, InvoiceRecord, ProductRecord,
    to_money,
};

// --- Customers ---

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CustomerRequest {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerInfo {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
}

impl From<CustomerRecord> for CustomerInfo {
    fn from(row: CustomerRecord) -> Self {
        Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
        }
    }
}

// --- Products ---

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProductRequest {
    pub name: String,
    pub description: String,
    /// Decimal string, e.g. `"19.99"`.
    pub price: String,
    pub available_items: i32,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductInfo {
    pub id: i32,
    pub name: String,
    /// Empty when the product has no description.
    pub description: String,
    pub price: String,
    pub available_items: i32,
}

impl From<ProductRecord> for ProductInfo {
    fn from(row: ProductRecord) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description.unwrap_or_default(),
            price: to_money(row.price).to_string(),
            available_items: row.available_items,
        }
    }
}

// --- Invoices ---

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InvoiceRequest {
    pub invoice_number: String,
    /// RFC 3339. Defaults to now on create; required on update.
    pub invoice_date: Option<DateTime<Utc>>,
    pub customer_id: i32,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvoiceInfo {
    pub id: i32,
    pub invoice_number: String,
    pub invoice_date: DateTime<Utc>,
    pub customer_id: i32,
}

impl From<InvoiceRecord> for InvoiceInfo {
    fn from(row: InvoiceRecord) -> Self {
        Self {
            id: row.id,
            invoice_number: row.invoice_number,
            invoice_date: row.invoice_date,
            customer_id: row.customer_id,
        }
    }
}

// --- Invoice items ---

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InvoiceItemRequest {
    pub count: i32,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvoiceItemInfo {
    pub id: i32,
    pub invoice_id: i32,
    pub product_id: i32,
    pub count: i32,
}

impl From<InvoiceItemRecord> for InvoiceItemInfo {
    fn from(row: InvoiceItemRecord) -> Self {
        Self {
            id: row.id,
            invoice_id: row.invoice_id,
            product_id: row.product_id,
            count: row.count,
        }
    }
}

/// A product line on an invoice. `id` is the product id.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvoiceProductInfo {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub price: String,
    pub count: i32,
    pub sum: String,
}

impl From<InvoiceProductRecord> for InvoiceProductInfo {
    fn from(row: InvoiceProductRecord) -> Self {
        Self {
            id: row.product_id,
            name: row.name,
            description: row.description.unwrap_or_default(),
            price: to_money(row.price).to_string(),
            count: row.count,
            sum: to_money(row.sum).to_string(),
        }
    }
}
