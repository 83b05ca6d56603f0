//! Database abstraction layer.
//!
//! Provides a backend-agnostic `Database` trait that unifies the persistence
//! operations of every resource. Two implementations exist:
//!
//! - `postgres` (default feature): `deadpool-postgres` + `tokio-postgres`
//! - `memory`: process-local tables honoring the same named constraints,
//!   used by tests and for running without a database
//!
//! Every operation is a single atomic step against the backend. "Row not
//! found" is reported in the return type (`Option`, `DeleteOutcome`), never as
//! an error; integrity violations are reported as
//! `DatabaseError::Constraint` carrying the constraint's schema name.

#[cfg(feature = "postgres")]
pub mod postgres;

pub mod memory;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::DatabaseConfig;
use crate::error::DatabaseError;

/// Upper bound on rows returned by every list operation.
pub const LIST_LIMIT: i64 = 100;

/// Open the configured backend and make sure the schema exists.
#[cfg(feature = "postgres")]
pub async fn connect_from_config(
    config: &DatabaseConfig,
) -> Result<Arc<dyn Database>, DatabaseError> {
    let pg = postgres::PgBackend::new(config).await?;
    pg.ensure_schema().await?;
    Ok(Arc::new(pg))
}

#[cfg(not(feature = "postgres"))]
pub async fn connect_from_config(
    _config: &DatabaseConfig,
) -> Result<Arc<dyn Database>, DatabaseError> {
    Err(DatabaseError::Pool(
        "No database backend available. Enable the 'postgres' feature.".to_string(),
    ))
}

/// Result of an atomic check-then-delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

// ==================== Records ====================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRecord {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerParams {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub available_items: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductParams {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub available_items: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRecord {
    pub id: i32,
    pub invoice_number: String,
    pub invoice_date: DateTime<Utc>,
    pub customer_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceParams {
    pub invoice_number: String,
    pub invoice_date: DateTime<Utc>,
    pub customer_id: i32,
}

/// Row of the invoice/product association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceItemRecord {
    pub id: i32,
    pub invoice_id: i32,
    pub product_id: i32,
    pub count: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceItemParams {
    pub invoice_id: i32,
    pub product_id: i32,
    pub count: i32,
}

/// A product as it appears on an invoice, with the computed line sum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceProductRecord {
    pub product_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub count: i32,
    pub sum: Decimal,
}

/// Fixed-point scale of every monetary column.
pub const MONEY_SCALE: u32 = 2;

/// Normalize a monetary value to the store's fixed-point scale, rounding
/// half away from zero as `NUMERIC` does.
pub fn to_money(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// `price × count` at the store's fixed-point scale.
pub fn line_sum(price: Decimal, count: i32) -> Decimal {
    to_money(price * Decimal::from(count))
}

// ==================== Sub-traits ====================
//
// Each sub-trait groups the persistence operations of one resource. The
// `Database` supertrait combines them into a single `Arc<dyn Database>`.

#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn list_customers(&self, limit: i64) -> Result<Vec<CustomerRecord>, DatabaseError>;
    async fn create_customer(
        &self,
        input: &CustomerParams,
    ) -> Result<CustomerRecord, DatabaseError>;
    async fn get_customer(&self, id: i32) -> Result<Option<CustomerRecord>, DatabaseError>;
    async fn update_customer(
        &self,
        id: i32,
        input: &CustomerParams,
    ) -> Result<Option<CustomerRecord>, DatabaseError>;
    async fn delete_customer(&self, id: i32) -> Result<DeleteOutcome, DatabaseError>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn list_products(&self, limit: i64) -> Result<Vec<ProductRecord>, DatabaseError>;
    async fn create_product(&self, input: &ProductParams) -> Result<ProductRecord, DatabaseError>;
    async fn get_product(&self, id: i32) -> Result<Option<ProductRecord>, DatabaseError>;
    async fn update_product(
        &self,
        id: i32,
        input: &ProductParams,
    ) -> Result<Option<ProductRecord>, DatabaseError>;
    async fn delete_product(&self, id: i32) -> Result<DeleteOutcome, DatabaseError>;
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn list_invoices(&self, limit: i64) -> Result<Vec<InvoiceRecord>, DatabaseError>;
    async fn create_invoice(&self, input: &InvoiceParams) -> Result<InvoiceRecord, DatabaseError>;
    async fn get_invoice(&self, id: i32) -> Result<Option<InvoiceRecord>, DatabaseError>;
    async fn update_invoice(
        &self,
        id: i32,
        input: &InvoiceParams,
    ) -> Result<Option<InvoiceRecord>, DatabaseError>;
    async fn delete_invoice(&self, id: i32) -> Result<DeleteOutcome, DatabaseError>;
}

#[async_trait]
pub trait InvoiceItemStore: Send + Sync {
    /// Products on an invoice ordered by product id.
    ///
    /// Returns `None` when the invoice itself does not exist, and
    /// `Some(vec![])` for an existing invoice without items.
    async fn list_invoice_products(
        &self,
        invoice_id: i32,
        limit: i64,
    ) -> Result<Option<Vec<InvoiceProductRecord>>, DatabaseError>;

    /// Insert the pair, or replace its count if the pair already exists.
    async fn upsert_invoice_item(
        &self,
        input: &InvoiceItemParams,
    ) -> Result<InvoiceItemRecord, DatabaseError>;

    async fn remove_invoice_item(
        &self,
        invoice_id: i32,
        product_id: i32,
    ) -> Result<DeleteOutcome, DatabaseError>;
}

/// Backend-agnostic database supertrait.
#[async_trait]
pub trait Database:
    CustomerStore + ProductStore + InvoiceStore + InvoiceItemStore + Send + Sync
{
    /// Create any missing tables.
    async fn ensure_schema(&self) -> Result<(), DatabaseError>;

    /// Connectivity probe for health checks.
    async fn ping(&self) -> Result<(), DatabaseError>;
}
