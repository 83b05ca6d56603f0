//! Products on an invoice.
//!
//! Posting a product that is already on the invoice replaces its count; there
//! is no separate update path for line items.

use crate::db::{DeleteOutcome, InvoiceItemParams, InvoiceItemStore, LIST_LIMIT};
use crate::error::ApiError;
use crate::handlers::{AppContext, Reply, decode_body, invoices};
use crate::routing::RelationAction;
use crate::translate::{Action, COUNT_NOT_POSITIVE};
use crate::web::types::{InvoiceItemInfo, InvoiceItemRequest, InvoiceProductInfo};

pub const PAIR_NOT_FOUND: &str = "Provided invoice doesn't contain the specified product";

pub(super) async fn pair(
    ctx: &AppContext,
    invoice_id: i32,
    product_id: i32,
    action: RelationAction,
    body: &[u8],
) -> Result<Reply, ApiError> {
    match action {
        RelationAction::Upsert => upsert(ctx, invoice_id, product_id, decode_body(body)?).await,
        RelationAction::Remove => remove(ctx, invoice_id, product_id).await,
    }
}

pub async fn list(ctx: &AppContext, invoice_id: i32) -> Result<Reply, ApiError> {
    let rows = ctx
        .db
        .list_invoice_products(invoice_id, LIST_LIMIT)
        .await
        .map_err(ctx.store_error(Action::Read))?
        .ok_or_else(|| ApiError::NotFound(invoices::NOT_FOUND.to_string()))?;
    let products: Vec<InvoiceProductInfo> =
        rows.into_iter().map(InvoiceProductInfo::from).collect();
    Reply::ok(&products)
}

pub async fn upsert(
    ctx: &AppContext,
    invoice_id: i32,
    product_id: i32,
    req: InvoiceItemRequest,
) -> Result<Reply, ApiError> {
    if req.count <= 0 {
        return Err(ApiError::Validation(COUNT_NOT_POSITIVE.to_string()));
    }
    let params = InvoiceItemParams {
        invoice_id,
        product_id,
        count: req.count,
    };
    let row = ctx
        .db
        .upsert_invoice_item(&params)
        .await
        .map_err(ctx.store_error(Action::Write))?;
    tracing::debug!(invoice_id, product_id, count = row.count, "Stored invoice item");
    Reply::created(&InvoiceItemInfo::from(row))
}

pub async fn remove(ctx: &AppContext, invoice_id: i32, product_id: i32) -> Result<Reply, ApiError> {
    match ctx
        .db
        .remove_invoice_item(invoice_id, product_id)
        .await
        .map_err(ctx.store_error(Action::Delete))?
    {
        DeleteOutcome::Deleted => Ok(Reply::NoContent),
        DeleteOutcome::NotFound => Err(ApiError::NotFound(PAIR_NOT_FOUND.to_string())),
    }
}
