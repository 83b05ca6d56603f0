//! PostgreSQL backend for the Database trait.
//!
//! Each trait method is exactly one statement, so existence checks and the
//! mutations they guard are evaluated atomically by the server.

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, PoolError, RecyclingMethod};
use secrecy::ExposeSecret as _;
use tokio_postgres::NoTls;
use tokio_postgres::error::SqlState;

use crate::config::DatabaseConfig;
use crate::db::schema::SCHEMA_SQL;
use crate::db::{
    CustomerParams, CustomerRecord, CustomerStore, Database, DeleteOutcome, InvoiceItemParams,
    InvoiceItemRecord, InvoiceItemStore, InvoiceParams, InvoiceProductRecord, InvoiceRecord,
    InvoiceStore, ProductParams, ProductRecord, ProductStore,
};
use crate::error::{ConstraintKind, DatabaseError};

/// PostgreSQL database backend.
pub struct PgBackend {
    pool: Pool,
}

impl PgBackend {
    /// Create a new PostgreSQL backend from configuration.
    ///
    /// The pool connects lazily; the first checkout surfaces connectivity errors.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let pg_config: tokio_postgres::Config = config
            .url
            .expose_secret()
            .parse()
            .map_err(|e: tokio_postgres::Error| {
                DatabaseError::Pool(format!("invalid DATABASE_URL: {e}"))
            })?;
        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(config.pool_size)
            .build()
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;
        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<Object, DatabaseError> {
        Ok(self.pool.get().await?)
    }
}

/// Violation class for an integrity-constraint SQLSTATE.
fn constraint_kind(code: &SqlState) -> Option<ConstraintKind> {
    if *code == SqlState::UNIQUE_VIOLATION {
        Some(ConstraintKind::Unique)
    } else if *code == SqlState::FOREIGN_KEY_VIOLATION {
        Some(ConstraintKind::ForeignKey)
    } else if *code == SqlState::CHECK_VIOLATION {
        Some(ConstraintKind::Check)
    } else if *code == SqlState::NOT_NULL_VIOLATION {
        Some(ConstraintKind::NotNull)
    } else {
        None
    }
}

impl From<tokio_postgres::Error> for DatabaseError {
    fn from(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error()
            && let Some(kind) = constraint_kind(db_err.code())
        {
            // NOT NULL violations carry the column rather than a constraint name.
            let constraint = db_err
                .constraint()
                .or(db_err.column())
                .unwrap_or_default();
            return DatabaseError::constraint(kind, constraint);
        }
        DatabaseError::Query(err.to_string())
    }
}

impl From<PoolError> for DatabaseError {
    fn from(err: PoolError) -> Self {
        DatabaseError::Pool(err.to_string())
    }
}

fn delete_outcome(affected: u64) -> DeleteOutcome {
    if affected > 0 {
        DeleteOutcome::Deleted
    } else {
        DeleteOutcome::NotFound
    }
}

fn row_to_customer(row: &tokio_postgres::Row) -> CustomerRecord {
    CustomerRecord {
        id: row.get(0),
        first_name: row.get(1),
        last_name: row.get(2),
    }
}

fn row_to_product(row: &tokio_postgres::Row) -> ProductRecord {
    ProductRecord {
        id: row.get(0),
        name: row.get(1),
        description: row.get(2),
        price: row.get(3),
        available_items: row.get(4),
    }
}

fn row_to_invoice(row: &tokio_postgres::Row) -> InvoiceRecord {
    InvoiceRecord {
        id: row.get(0),
        invoice_number: row.get(1),
        invoice_date: row.get(2),
        customer_id: row.get(3),
    }
}

fn row_to_invoice_item(row: &tokio_postgres::Row) -> InvoiceItemRecord {
    InvoiceItemRecord {
        id: row.get(0),
        invoice_id: row.get(1),
        product_id: row.get(2),
        count: row.get(3),
    }
}

/// Map a row of the invoice/product join. The left join yields one row with
/// null product columns for an invoice that has no items.
fn row_to_invoice_product(
    row: &tokio_postgres::Row,
) -> Result<Option<InvoiceProductRecord>, DatabaseError> {
    let Some(product_id) = row.get::<_, Option<i32>>(0) else {
        return Ok(None);
    };
    let missing = |column: &str| {
        DatabaseError::Serialization(format!(
            "invoice product {product_id} has null {column}"
        ))
    };
    Ok(Some(InvoiceProductRecord {
        product_id,
        name: row.get::<_, Option<String>>(1).ok_or_else(|| missing("name"))?,
        description: row.get(2),
        price: row.get::<_, Option<_>>(3).ok_or_else(|| missing("price"))?,
        count: row.get::<_, Option<i32>>(4).ok_or_else(|| missing("count"))?,
        sum: row.get::<_, Option<_>>(5).ok_or_else(|| missing("sum"))?,
    }))
}

// ==================== Database ====================

#[async_trait]
impl Database for PgBackend {
    async fn ensure_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.conn().await?;
        conn.batch_execute(SCHEMA_SQL).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        let conn = self.conn().await?;
        conn.execute("SELECT 1", &[]).await?;
        Ok(())
    }
}

// ==================== CustomerStore ====================

#[async_trait]
impl CustomerStore for PgBackend {
    async fn list_customers(&self, limit: i64) -> Result<Vec<CustomerRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                "SELECT id, first_name, last_name FROM customer ORDER BY id ASC LIMIT $1",
                &[&limit],
            )
            .await?;
        Ok(rows.iter().map(row_to_customer).collect())
    }

    async fn create_customer(
        &self,
        input: &CustomerParams,
    ) -> Result<CustomerRecord, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_one(
                "INSERT INTO customer (first_name, last_name) VALUES ($1, $2) \
                 RETURNING id, first_name, last_name",
                &[&input.first_name, &input.last_name],
            )
            .await?;
        Ok(row_to_customer(&row))
    }

    async fn get_customer(&self, id: i32) -> Result<Option<CustomerRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                "SELECT id, first_name, last_name FROM customer WHERE id = $1",
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_customer))
    }

    async fn update_customer(
        &self,
        id: i32,
        input: &CustomerParams,
    ) -> Result<Option<CustomerRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                "UPDATE customer SET first_name = $2, last_name = $3 WHERE id = $1 \
                 RETURNING id, first_name, last_name",
                &[&id, &input.first_name, &input.last_name],
            )
            .await?;
        Ok(row.as_ref().map(row_to_customer))
    }

    async fn delete_customer(&self, id: i32) -> Result<DeleteOutcome, DatabaseError> {
        let conn = self.conn().await?;
        let deleted = conn
            .execute("DELETE FROM customer WHERE id = $1", &[&id])
            .await?;
        Ok(delete_outcome(deleted))
    }
}

// ==================== ProductStore ====================

#[async_trait]
impl ProductStore for PgBackend {
    async fn list_products(&self, limit: i64) -> Result<Vec<ProductRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                "SELECT id, name, description, price, available_items \
                 FROM product ORDER BY id ASC LIMIT $1",
                &[&limit],
            )
            .await?;
        Ok(rows.iter().map(row_to_product).collect())
    }

    async fn create_product(&self, input: &ProductParams) -> Result<ProductRecord, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_one(
                "INSERT INTO product (name, description, price, available_items) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, name, description, price, available_items",
                &[
                    &input.name,
                    &input.description,
                    &input.price,
                    &input.available_items,
                ],
            )
            .await?;
        Ok(row_to_product(&row))
    }

    async fn get_product(&self, id: i32) -> Result<Option<ProductRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                "SELECT id, name, description, price, available_items \
                 FROM product WHERE id = $1",
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_product))
    }

    async fn update_product(
        &self,
        id: i32,
        input: &ProductParams,
    ) -> Result<Option<ProductRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                "UPDATE product SET \
                    name = $2, \
                    description = $3, \
                    price = $4, \
                    available_items = $5 \
                 WHERE id = $1 \
                 RETURNING id, name, description, price, available_items",
                &[
                    &id,
                    &input.name,
                    &input.description,
                    &input.price,
                    &input.available_items,
                ],
            )
            .await?;
        Ok(row.as_ref().map(row_to_product))
    }

    async fn delete_product(&self, id: i32) -> Result<DeleteOutcome, DatabaseError> {
        let conn = self.conn().await?;
        let deleted = conn
            .execute("DELETE FROM product WHERE id = $1", &[&id])
            .await?;
        Ok(delete_outcome(deleted))
    }
}

// ==================== InvoiceStore ====================

#[async_trait]
impl InvoiceStore for PgBackend {
    async fn list_invoices(&self, limit: i64) -> Result<Vec<InvoiceRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                "SELECT id, invoice_number, invoice_date, customer_id \
                 FROM invoice ORDER BY id ASC LIMIT $1",
                &[&limit],
            )
            .await?;
        Ok(rows.iter().map(row_to_invoice).collect())
    }

    async fn create_invoice(&self, input: &InvoiceParams) -> Result<InvoiceRecord, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_one(
                "INSERT INTO invoice (invoice_number, invoice_date, customer_id) \
                 VALUES ($1, $2, $3) \
                 RETURNING id, invoice_number, invoice_date, customer_id",
                &[&input.invoice_number, &input.invoice_date, &input.customer_id],
            )
            .await?;
        Ok(row_to_invoice(&row))
    }

    async fn get_invoice(&self, id: i32) -> Result<Option<InvoiceRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                "SELECT id, invoice_number, invoice_date, customer_id \
                 FROM invoice WHERE id = $1",
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_invoice))
    }

    async fn update_invoice(
        &self,
        id: i32,
        input: &InvoiceParams,
    ) -> Result<Option<InvoiceRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                "UPDATE invoice SET \
                    invoice_number = $2, \
                    invoice_date = $3, \
                    customer_id = $4 \
                 WHERE id = $1 \
                 RETURNING id, invoice_number, invoice_date, customer_id",
                &[
                    &id,
                    &input.invoice_number,
                    &input.invoice_date,
                    &input.customer_id,
                ],
            )
            .await?;
        Ok(row.as_ref().map(row_to_invoice))
    }

    async fn delete_invoice(&self, id: i32) -> Result<DeleteOutcome, DatabaseError> {
        let conn = self.conn().await?;
        let deleted = conn
            .execute("DELETE FROM invoice WHERE id = $1", &[&id])
            .await?;
        Ok(delete_outcome(deleted))
    }
}

// ==================== InvoiceItemStore ====================

#[async_trait]
impl InvoiceItemStore for PgBackend {
    async fn list_invoice_products(
        &self,
        invoice_id: i32,
        limit: i64,
    ) -> Result<Option<Vec<InvoiceProductRecord>>, DatabaseError> {
        let conn = self.conn().await?;
        // Driving the join from `invoice` keeps the existence check in the
        // same statement: no rows means the invoice itself is missing.
        let rows = conn
            .query(
                "SELECT p.id, p.name, p.description, p.price, ii.count, \
                        ROUND(p.price * ii.count, 2) AS sum \
                 FROM invoice i \
                 LEFT JOIN invoice_item ii ON ii.invoice_id = i.id \
                 LEFT JOIN product p ON p.id = ii.product_id \
                 WHERE i.id = $1 \
                 ORDER BY p.id ASC \
                 LIMIT $2",
                &[&invoice_id, &limit],
            )
            .await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut products = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(product) = row_to_invoice_product(row)? {
                products.push(product);
            }
        }
        Ok(Some(products))
    }

    async fn upsert_invoice_item(
        &self,
        input: &InvoiceItemParams,
    ) -> Result<InvoiceItemRecord, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_one(
                "INSERT INTO invoice_item (invoice_id, product_id, count) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT ON CONSTRAINT invoice_item_invoice_id_product_id_key \
                 DO UPDATE SET count = EXCLUDED.count \
                 RETURNING id, invoice_id, product_id, count",
                &[&input.invoice_id, &input.product_id, &input.count],
            )
            .await?;
        Ok(row_to_invoice_item(&row))
    }

    async fn remove_invoice_item(
        &self,
        invoice_id: i32,
        product_id: i32,
    ) -> Result<DeleteOutcome, DatabaseError> {
        let conn = self.conn().await?;
        let deleted = conn
            .execute(
                "DELETE FROM invoice_item WHERE invoice_id = $1 AND product_id = $2",
                &[&invoice_id, &product_id],
            )
            .await?;
        Ok(delete_outcome(deleted))
    }
}
