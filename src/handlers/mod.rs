//! Resource handlers.
//!
//! Every operation receives an [`AppContext`] explicitly: the store handle and
//! the constraint table are never global, so tests substitute the in-memory
//! backend without touching handler code.

pub mod customers;
pub mod invoice_items;
pub mod invoices;
pub mod products;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::db::Database;
use crate::error::{ApiError, DatabaseError};
use crate::routing::{Resource, Route};
use crate::translate::{Action, ConstraintTable};

pub const JSON_PARSE_ERROR: &str = "An error occurred while parsing the input JSON";

/// Shared state handed to every operation.
pub struct AppContext {
    pub db: Arc<dyn Database>,
    pub constraints: ConstraintTable,
}

impl AppContext {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            db,
            constraints: ConstraintTable::default(),
        }
    }

    /// Translator for `map_err` on store calls.
    pub fn store_error(&self, action: Action) -> impl Fn(DatabaseError) -> ApiError + '_ {
        move |err| self.constraints.translate(&err, action)
    }
}

/// Successful outcome of an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// 200 with a JSON body.
    Ok(Value),
    /// 201 with a JSON body.
    Created(Value),
    /// 204, empty body.
    NoContent,
}

impl Reply {
    pub fn ok<T: Serialize>(body: &T) -> Result<Self, ApiError> {
        to_json(body).map(Self::Ok)
    }

    pub fn created<T: Serialize>(body: &T) -> Result<Self, ApiError> {
        to_json(body).map(Self::Created)
    }
}

fn to_json<T: Serialize>(body: &T) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| {
        tracing::error!(error = %e, "Failed to encode response body");
        ApiError::Internal
    })
}

/// Parse a JSON request body.
pub fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|_| ApiError::BadRequest(JSON_PARSE_ERROR.to_string()))
}

/// Run the operation a resolved route names.
pub async fn dispatch(ctx: &AppContext, route: Route, body: &[u8]) -> Result<Reply, ApiError> {
    match route {
        Route::Collection { resource, action } => match resource {
            Resource::Customers => customers::collection(ctx, action, body).await,
            Resource::Products => products::collection(ctx, action, body).await,
            Resource::Invoices => invoices::collection(ctx, action, body).await,
        },
        Route::Item {
            resource,
            id,
            action,
        } => match resource {
            Resource::Customers => customers::item(ctx, id, action, body).await,
            Resource::Products => products::item(ctx, id, action, body).await,
            Resource::Invoices => invoices::item(ctx, id, action, body).await,
        },
        Route::InvoiceProducts { invoice_id } => invoice_items::list(ctx, invoice_id).await,
        Route::InvoiceProduct {
            invoice_id,
            product_id,
            action,
        } => invoice_items::pair(ctx, invoice_id, product_id, action, body).await,
    }
}
