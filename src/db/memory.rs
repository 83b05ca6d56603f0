//! In-memory backend for the Database trait.
//!
//! Mirrors the relational schema closely enough to stand in for PostgreSQL in
//! tests and local runs: ids come from per-table sequences starting at 1,
//! monetary values are stored at the `NUMERIC(10, 2)` scale, and integrity
//! violations are reported under the same constraint names as `schema.sql`.
//! A single mutex guards all tables, so every operation is atomic.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, MutexGuard};

use crate::db::schema::{
    BLANK_CHARS, CUSTOMER_FIRST_NAME_CHECK, CUSTOMER_LAST_NAME_CHECK, INVOICE_CUSTOMER_FKEY,
    INVOICE_ITEM_COUNT_CHECK, INVOICE_ITEM_INVOICE_FKEY, INVOICE_ITEM_PRODUCT_FKEY,
    INVOICE_NUMBER_CHECK, INVOICE_NUMBER_KEY, PRODUCT_AVAILABLE_ITEMS_CHECK, PRODUCT_NAME_CHECK,
    PRODUCT_PRICE_CHECK,
};
use crate::db::{
    CustomerParams, CustomerRecord, CustomerStore, Database, DeleteOutcome, InvoiceItemParams,
    InvoiceItemRecord, InvoiceItemStore, InvoiceParams, InvoiceProductRecord, InvoiceRecord,
    InvoiceStore, ProductParams, ProductRecord, ProductStore, line_sum, to_money,
};
use crate::error::{ConstraintKind, DatabaseError};

#[derive(Debug)]
struct Table<T> {
    rows: BTreeMap<i32, T>,
    last_id: i32,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
        }
    }
}

impl<T: Clone> Table<T> {
    fn next_id(&mut self) -> Result<i32, DatabaseError> {
        self.last_id = self
            .last_id
            .checked_add(1)
            .ok_or_else(|| DatabaseError::Query("sequence exhausted".to_string()))?;
        Ok(self.last_id)
    }

    fn list(&self, limit: i64) -> Vec<T> {
        let limit = usize::try_from(limit).unwrap_or(0);
        self.rows.values().take(limit).cloned().collect()
    }
}

#[derive(Debug, Default)]
struct Tables {
    customers: Table<CustomerRecord>,
    products: Table<ProductRecord>,
    invoices: Table<InvoiceRecord>,
    invoice_items: Table<InvoiceItemRecord>,
}

/// Process-local database backend.
#[derive(Debug)]
pub struct InMemoryBackend {
    tables: Mutex<Tables>,
    available: AtomicBool,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate losing (or regaining) the connection. While unavailable every
    /// operation fails with `DatabaseError::Pool`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), DatabaseError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DatabaseError::Pool("in-memory store unavailable".to_string()))
        }
    }

    async fn tables(&self) -> Result<MutexGuard<'_, Tables>, DatabaseError> {
        self.check_available()?;
        Ok(self.tables.lock().await)
    }
}

fn check(holds: bool, constraint: &str) -> Result<(), DatabaseError> {
    if holds {
        Ok(())
    } else {
        Err(DatabaseError::constraint(ConstraintKind::Check, constraint))
    }
}

fn foreign_key(holds: bool, constraint: &str) -> Result<(), DatabaseError> {
    if holds {
        Ok(())
    } else {
        Err(DatabaseError::constraint(
            ConstraintKind::ForeignKey,
            constraint,
        ))
    }
}

fn not_blank(value: &str) -> bool {
    !value.trim_matches(BLANK_CHARS).is_empty()
}

fn validate_customer(input: &CustomerParams) -> Result<(), DatabaseError> {
    check(not_blank(&input.first_name), CUSTOMER_FIRST_NAME_CHECK)?;
    check(not_blank(&input.last_name), CUSTOMER_LAST_NAME_CHECK)
}

fn validate_product(input: &ProductParams) -> Result<Decimal, DatabaseError> {
    let price = to_money(input.price);
    check(not_blank(&input.name), PRODUCT_NAME_CHECK)?;
    check(price >= Decimal::ZERO, PRODUCT_PRICE_CHECK)?;
    check(input.available_items >= 0, PRODUCT_AVAILABLE_ITEMS_CHECK)?;
    Ok(price)
}

impl Tables {
    fn validate_invoice(
        &self,
        input: &InvoiceParams,
        updating: Option<i32>,
    ) -> Result<(), DatabaseError> {
        check(not_blank(&input.invoice_number), INVOICE_NUMBER_CHECK)?;
        let duplicate = self
            .invoices
            .rows
            .values()
            .any(|inv| inv.invoice_number == input.invoice_number && Some(inv.id) != updating);
        if duplicate {
            return Err(DatabaseError::constraint(
                ConstraintKind::Unique,
                INVOICE_NUMBER_KEY,
            ));
        }
        foreign_key(
            self.customers.rows.contains_key(&input.customer_id),
            INVOICE_CUSTOMER_FKEY,
        )
    }
}

#[async_trait]
impl Database for InMemoryBackend {
    async fn ensure_schema(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        self.check_available()
    }
}

#[async_trait]
impl CustomerStore for InMemoryBackend {
    async fn list_customers(&self, limit: i64) -> Result<Vec<CustomerRecord>, DatabaseError> {
        Ok(self.tables().await?.customers.list(limit))
    }

    async fn create_customer(
        &self,
        input: &CustomerParams,
    ) -> Result<CustomerRecord, DatabaseError> {
        validate_customer(input)?;
        let mut tables = self.tables().await?;
        let id = tables.customers.next_id()?;
        let record = CustomerRecord {
            id,
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
        };
        tables.customers.rows.insert(id, record.clone());
        Ok(record)
    }

    async fn get_customer(&self, id: i32) -> Result<Option<CustomerRecord>, DatabaseError> {
        Ok(self.tables().await?.customers.rows.get(&id).cloned())
    }

    async fn update_customer(
        &self,
        id: i32,
        input: &CustomerParams,
    ) -> Result<Option<CustomerRecord>, DatabaseError> {
        let mut tables = self.tables().await?;
        let Some(existing) = tables.customers.rows.get_mut(&id) else {
            return Ok(None);
        };
        validate_customer(input)?;
        existing.first_name = input.first_name.clone();
        existing.last_name = input.last_name.clone();
        Ok(Some(existing.clone()))
    }

    async fn delete_customer(&self, id: i32) -> Result<DeleteOutcome, DatabaseError> {
        let mut tables = self.tables().await?;
        if !tables.customers.rows.contains_key(&id) {
            return Ok(DeleteOutcome::NotFound);
        }
        let referenced = tables.invoices.rows.values().any(|inv| inv.customer_id == id);
        foreign_key(!referenced, INVOICE_CUSTOMER_FKEY)?;
        tables.customers.rows.remove(&id);
        Ok(DeleteOutcome::Deleted)
    }
}

#[async_trait]
impl ProductStore for InMemoryBackend {
    async fn list_products(&self, limit: i64) -> Result<Vec<ProductRecord>, DatabaseError> {
        Ok(self.tables().await?.products.list(limit))
    }

    async fn create_product(&self, input: &ProductParams) -> Result<ProductRecord, DatabaseError> {
        let price = validate_product(input)?;
        let mut tables = self.tables().await?;
        let id = tables.products.next_id()?;
        let record = ProductRecord {
            id,
            name: input.name.clone(),
            description: input.description.clone(),
            price,
            available_items: input.available_items,
        };
        tables.products.rows.insert(id, record.clone());
        Ok(record)
    }

    async fn get_product(&self, id: i32) -> Result<Option<ProductRecord>, DatabaseError> {
        Ok(self.tables().await?.products.rows.get(&id).cloned())
    }

    async fn update_product(
        &self,
        id: i32,
        input: &ProductParams,
    ) -> Result<Option<ProductRecord>, DatabaseError> {
        let mut tables = self.tables().await?;
        let Some(existing) = tables.products.rows.get_mut(&id) else {
            return Ok(None);
        };
        let price = validate_product(input)?;
        existing.name = input.name.clone();
        existing.description = input.description.clone();
        existing.price = price;
        existing.available_items = input.available_items;
        Ok(Some(existing.clone()))
    }

    async fn delete_product(&self, id: i32) -> Result<DeleteOutcome, DatabaseError> {
        let mut tables = self.tables().await?;
        if !tables.products.rows.contains_key(&id) {
            return Ok(DeleteOutcome::NotFound);
        }
        let referenced = tables
            .invoice_items
            .rows
            .values()
            .any(|item| item.product_id == id);
        foreign_key(!referenced, INVOICE_ITEM_PRODUCT_FKEY)?;
        tables.products.rows.remove(&id);
        Ok(DeleteOutcome::Deleted)
    }
}

#[async_trait]
impl InvoiceStore for InMemoryBackend {
    async fn list_invoices(&self, limit: i64) -> Result<Vec<InvoiceRecord>, DatabaseError> {
        Ok(self.tables().await?.invoices.list(limit))
    }

    async fn create_invoice(&self, input: &InvoiceParams) -> Result<InvoiceRecord, DatabaseError> {
        let mut tables = self.tables().await?;
        tables.validate_invoice(input, None)?;
        let id = tables.invoices.next_id()?;
        let record = InvoiceRecord {
            id,
            invoice_number: input.invoice_number.clone(),
            invoice_date: input.invoice_date,
            customer_id: input.customer_id,
        };
        tables.invoices.rows.insert(id, record.clone());
        Ok(record)
    }

    async fn get_invoice(&self, id: i32) -> Result<Option<InvoiceRecord>, DatabaseError> {
        Ok(self.tables().await?.invoices.rows.get(&id).cloned())
    }

    async fn update_invoice(
        &self,
        id: i32,
        input: &InvoiceParams,
    ) -> Result<Option<InvoiceRecord>, DatabaseError> {
        let mut tables = self.tables().await?;
        if !tables.invoices.rows.contains_key(&id) {
            return Ok(None);
        }
        tables.validate_invoice(input, Some(id))?;
        let record = InvoiceRecord {
            id,
            invoice_number: input.invoice_number.clone(),
            invoice_date: input.invoice_date,
            customer_id: input.customer_id,
        };
        tables.invoices.rows.insert(id, record.clone());
        Ok(Some(record))
    }

    async fn delete_invoice(&self, id: i32) -> Result<DeleteOutcome, DatabaseError> {
        let mut tables = self.tables().await?;
        if !tables.invoices.rows.contains_key(&id) {
            return Ok(DeleteOutcome::NotFound);
        }
        let referenced = tables
            .invoice_items
            .rows
            .values()
            .any(|item| item.invoice_id == id);
        foreign_key(!referenced, INVOICE_ITEM_INVOICE_FKEY)?;
        tables.invoices.rows.remove(&id);
        Ok(DeleteOutcome::Deleted)
    }
}

#[async_trait]
impl InvoiceItemStore for InMemoryBackend {
    async fn list_invoice_products(
        &self,
        invoice_id: i32,
        limit: i64,
    ) -> Result<Option<Vec<InvoiceProductRecord>>, DatabaseError> {
        let tables = self.tables().await?;
        if !tables.invoices.rows.contains_key(&invoice_id) {
            return Ok(None);
        }

        let mut products = Vec::new();
        for item in tables
            .invoice_items
            .rows
            .values()
            .filter(|item| item.invoice_id == invoice_id)
        {
            let product = tables.products.rows.get(&item.product_id).ok_or_else(|| {
                DatabaseError::Serialization(format!(
                    "invoice item {} references missing product {}",
                    item.id, item.product_id
                ))
            })?;
            products.push(InvoiceProductRecord {
                product_id: product.id,
                name: product.name.clone(),
                description: product.description.clone(),
                price: product.price,
                count: item.count,
                sum: line_sum(product.price, item.count),
            });
        }
        products.sort_by_key(|p| p.product_id);
        products.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(Some(products))
    }

    async fn upsert_invoice_item(
        &self,
        input: &InvoiceItemParams,
    ) -> Result<InvoiceItemRecord, DatabaseError> {
        check(input.count > 0, INVOICE_ITEM_COUNT_CHECK)?;
        let mut tables = self.tables().await?;

        let existing = tables.invoice_items.rows.values_mut().find(|item| {
            item.invoice_id == input.invoice_id && item.product_id == input.product_id
        });
        if let Some(item) = existing {
            item.count = input.count;
            return Ok(item.clone());
        }

        foreign_key(
            tables.invoices.rows.contains_key(&input.invoice_id),
            INVOICE_ITEM_INVOICE_FKEY,
        )?;
        foreign_key(
            tables.products.rows.contains_key(&input.product_id),
            INVOICE_ITEM_PRODUCT_FKEY,
        )?;
        let id = tables.invoice_items.next_id()?;
        let record = InvoiceItemRecord {
            id,
            invoice_id: input.invoice_id,
            product_id: input.product_id,
            count: input.count,
        };
        tables.invoice_items.rows.insert(id, record.clone());
        Ok(record)
    }

    async fn remove_invoice_item(
        &self,
        invoice_id: i32,
        product_id: i32,
    ) -> Result<DeleteOutcome, DatabaseError> {
        let mut tables = self.tables().await?;
        let found = tables
            .invoice_items
            .rows
            .iter()
            .find(|(_, item)| item.invoice_id == invoice_id && item.product_id == product_id)
            .map(|(id, _)| *id);
        match found {
            Some(id) => {
                tables.invoice_items.rows.remove(&id);
                Ok(DeleteOutcome::Deleted)
            }
            None => Ok(DeleteOutcome::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::db::LIST_LIMIT;

    fn customer(first: &str, last: &str) -> CustomerParams {
        CustomerParams {
            first_name: first.to_string(),
            last_name: last.to_string(),
        }
    }

    fn product(name: &str, price: Decimal) -> ProductParams {
        ProductParams {
            name: name.to_string(),
            description: None,
            price,
            available_items: 1,
        }
    }

    fn invoice(number: &str, customer_id: i32) -> InvoiceParams {
        InvoiceParams {
            invoice_number: number.to_string(),
            invoice_date: Utc::now(),
            customer_id,
        }
    }

    fn assert_constraint(err: DatabaseError, kind: ConstraintKind, name: &str) {
        match err {
            DatabaseError::Constraint {
                kind: got_kind,
                constraint,
            } => {
                assert_eq!(got_kind, kind);
                assert_eq!(constraint, name);
            }
            other => panic!("expected constraint violation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ids_are_sequential_per_table() {
        let db = InMemoryBackend::new();
        let a = db.create_customer(&customer("A", "One")).await.expect("a");
        let b = db.create_customer(&customer("B", "Two")).await.expect("b");
        let p = db.create_product(&product("Mouse", dec!(1))).await.expect("p");
        assert_eq!((a.id, b.id, p.id), (1, 2, 1));
    }

    #[tokio::test]
    async fn list_is_ordered_and_capped() {
        let db = InMemoryBackend::new();
        for i in 0..(LIST_LIMIT + 5) {
            db.create_customer(&customer(&format!("C{i}"), "Last"))
                .await
                .expect("create");
        }
        let listed = db.list_customers(LIST_LIMIT).await.expect("list");
        assert_eq!(listed.len(), 100);
        assert!(listed.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[tokio::test]
    async fn product_price_is_stored_at_money_scale() {
        let db = InMemoryBackend::new();
        let created = db
            .create_product(&product("Mouse", dec!(222)))
            .await
            .expect("create");
        assert_eq!(created.price.to_string(), "222.00");
    }

    #[tokio::test]
    async fn blank_checks_strip_the_schema_character_set() {
        let db = InMemoryBackend::new();
        let err = db
            .create_customer(&customer("\t\r\n ", "Black"))
            .await
            .expect_err("tab-only first name");
        assert_constraint(err, ConstraintKind::Check, CUSTOMER_FIRST_NAME_CHECK);

        // btrim leaves other whitespace alone, so the store accepts it.
        let created = db
            .create_customer(&customer("\u{a0}", "Black"))
            .await
            .expect("non-breaking space");
        assert_eq!(created.first_name, "\u{a0}");
    }

    #[tokio::test]
    async fn negative_price_violates_check() {
        let db = InMemoryBackend::new();
        let err = db
            .create_product(&product("Mouse", dec!(-1)))
            .await
            .expect_err("negative price");
        assert_constraint(err, ConstraintKind::Check, PRODUCT_PRICE_CHECK);
        assert!(db.list_products(LIST_LIMIT).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn duplicate_invoice_number_violates_unique_key() {
        let db = InMemoryBackend::new();
        db.create_customer(&customer("Jarred", "Black")).await.expect("c");
        db.create_invoice(&invoice("INV-1", 1)).await.expect("first");
        let err = db
            .create_invoice(&invoice("INV-1", 1))
            .await
            .expect_err("duplicate");
        assert_constraint(err, ConstraintKind::Unique, INVOICE_NUMBER_KEY);
        assert_eq!(db.list_invoices(LIST_LIMIT).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn updating_invoice_keeps_its_own_number() {
        let db = InMemoryBackend::new();
        db.create_customer(&customer("Jarred", "Black")).await.expect("c");
        db.create_invoice(&invoice("INV-1", 1)).await.expect("first");
        let updated = db
            .update_invoice(1, &invoice("INV-1", 1))
            .await
            .expect("update")
            .expect("exists");
        assert_eq!(updated.invoice_number, "INV-1");
    }

    #[tokio::test]
    async fn invoice_for_missing_customer_violates_foreign_key() {
        let db = InMemoryBackend::new();
        let err = db
            .create_invoice(&invoice("INV-1", 7))
            .await
            .expect_err("missing customer");
        assert_constraint(err, ConstraintKind::ForeignKey, INVOICE_CUSTOMER_FKEY);
    }

    #[tokio::test]
    async fn referenced_customer_cannot_be_deleted() {
        let db = InMemoryBackend::new();
        db.create_customer(&customer("Jarred", "Black")).await.expect("c");
        db.create_invoice(&invoice("INV-1", 1)).await.expect("inv");

        let err = db.delete_customer(1).await.expect_err("referenced");
        assert_constraint(err, ConstraintKind::ForeignKey, INVOICE_CUSTOMER_FKEY);
        assert!(db.get_customer(1).await.expect("get").is_some());
        assert_eq!(
            db.delete_customer(2).await.expect("missing"),
            DeleteOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn upsert_replaces_count_for_existing_pair() {
        let db = InMemoryBackend::new();
        db.create_customer(&customer("Jarred", "Black")).await.expect("c");
        db.create_invoice(&invoice("INV-1", 1)).await.expect("inv");
        db.create_product(&product("Mouse", dec!(222))).await.expect("p");

        let params = InvoiceItemParams {
            invoice_id: 1,
            product_id: 1,
            count: 5,
        };
        let first = db.upsert_invoice_item(&params).await.expect("first");
        let second = db.upsert_invoice_item(&params).await.expect("second");
        assert_eq!(first, second);

        let replaced = db
            .upsert_invoice_item(&InvoiceItemParams { count: 3, ..params })
            .await
            .expect("replace");
        assert_eq!(replaced.id, first.id);
        assert_eq!(replaced.count, 3);

        let listed = db
            .list_invoice_products(1, LIST_LIMIT)
            .await
            .expect("list")
            .expect("invoice exists");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].sum.to_string(), "666.00");
    }

    #[tokio::test]
    async fn upsert_reports_which_parent_is_missing() {
        let db = InMemoryBackend::new();
        db.create_customer(&customer("Jarred", "Black")).await.expect("c");
        db.create_invoice(&invoice("INV-1", 1)).await.expect("inv");

        let err = db
            .upsert_invoice_item(&InvoiceItemParams {
                invoice_id: 1,
                product_id: 9,
                count: 1,
            })
            .await
            .expect_err("missing product");
        assert_constraint(err, ConstraintKind::ForeignKey, INVOICE_ITEM_PRODUCT_FKEY);

        let err = db
            .upsert_invoice_item(&InvoiceItemParams {
                invoice_id: 9,
                product_id: 1,
                count: 1,
            })
            .await
            .expect_err("missing invoice");
        assert_constraint(err, ConstraintKind::ForeignKey, INVOICE_ITEM_INVOICE_FKEY);
    }

    #[tokio::test]
    async fn relation_list_distinguishes_missing_invoice_from_empty() {
        let db = InMemoryBackend::new();
        assert_eq!(db.list_invoice_products(1, LIST_LIMIT).await.expect("list"), None);

        db.create_customer(&customer("Jarred", "Black")).await.expect("c");
        db.create_invoice(&invoice("INV-1", 1)).await.expect("inv");
        assert_eq!(
            db.list_invoice_products(1, LIST_LIMIT).await.expect("list"),
            Some(Vec::new())
        );
    }

    #[tokio::test]
    async fn operations_follow_availability() {
        let db = InMemoryBackend::new();
        assert!(db.ping().await.is_ok());
        db.set_available(false);
        assert!(db.ping().await.is_err());
        assert!(matches!(
            db.list_customers(LIST_LIMIT).await,
            Err(DatabaseError::Pool(_))
        ));
        db.set_available(true);
        assert!(db.list_customers(LIST_LIMIT).await.is_ok());
    }
}
