//! Invoice resource.

use chrono::{DateTime, Utc};

use crate::db::{DeleteOutcome, InvoiceParams, InvoiceStore, LIST_LIMIT};
use crate::error::ApiError;
use crate::handlers::{AppContext, Reply, decode_body};
use crate::routing::{CollectionAction, ItemAction};
use crate::translate::{
    Action, CUSTOMER_ID_NOT_POSITIVE, INVOICE_DATE_REQUIRED, INVOICE_NUMBER_REQUIRED,
};
use crate::web::types::{InvoiceInfo, InvoiceRequest};

pub const NOT_FOUND: &str = "Invoice not found";

pub(super) async fn collection(
    ctx: &AppContext,
    action: CollectionAction,
    body: &[u8],
) -> Result<Reply, ApiError> {
    match action {
        CollectionAction::List => list(ctx).await,
        CollectionAction::Create => create(ctx, decode_body(body)?).await,
    }
}

pub(super) async fn item(
    ctx: &AppContext,
    id: i32,
    action: ItemAction,
    body: &[u8],
) -> Result<Reply, ApiError> {
    match action {
        ItemAction::Get => get(ctx, id).await,
        ItemAction::Update => update(ctx, id, decode_body(body)?).await,
        ItemAction::Delete => delete(ctx, id).await,
    }
}

/// Field checks shared by create and update. `default_date` fills a missing
/// `invoice_date`; without one the date is required.
fn validate(
    req: InvoiceRequest,
    default_date: Option<DateTime<Utc>>,
) -> Result<InvoiceParams, ApiError> {
    if req.invoice_number.trim().is_empty() {
        return Err(ApiError::Validation(INVOICE_NUMBER_REQUIRED.to_string()));
    }
    let invoice_date = req
        .invoice_date
        .or(default_date)
        .ok_or_else(|| ApiError::Validation(INVOICE_DATE_REQUIRED.to_string()))?;
    if req.customer_id <= 0 {
        return Err(ApiError::Validation(CUSTOMER_ID_NOT_POSITIVE.to_string()));
    }
    Ok(InvoiceParams {
        invoice_number: req.invoice_number,
        invoice_date,
        customer_id: req.customer_id,
    })
}

pub async fn list(ctx: &AppContext) -> Result<Reply, ApiError> {
    let rows = ctx
        .db
        .list_invoices(LIST_LIMIT)
        .await
        .map_err(ctx.store_error(Action::Read))?;
    let invoices: Vec<InvoiceInfo> = rows.into_iter().map(InvoiceInfo::from).collect();
    Reply::ok(&invoices)
}

pub async fn create(ctx: &AppContext, req: InvoiceRequest) -> Result<Reply, ApiError> {
    let params = validate(req, Some(Utc::now()))?;
    let row = ctx
        .db
        .create_invoice(&params)
        .await
        .map_err(ctx.store_error(Action::Write))?;
    tracing::debug!(id = row.id, invoice_number = %row.invoice_number, "Created invoice");
    Reply::created(&InvoiceInfo::from(row))
}

pub async fn get(ctx: &AppContext, id: i32) -> Result<Reply, ApiError> {
    let row = ctx
        .db
        .get_invoice(id)
        .await
        .map_err(ctx.store_error(Action::Read))?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;
    Reply::ok(&InvoiceInfo::from(row))
}

pub async fn update(ctx: &AppContext, id: i32, req: InvoiceRequest) -> Result<Reply, ApiError> {
    let params = validate(req, None)?;
    let row = ctx
        .db
        .update_invoice(id, &params)
        .await
        .map_err(ctx.store_error(Action::Write))?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;
    Reply::ok(&InvoiceInfo::from(row))
}

pub async fn delete(ctx: &AppContext, id: i32) -> Result<Reply, ApiError> {
    match ctx
        .db
        .delete_invoice(id)
        .await
        .map_err(ctx.store_error(Action::Delete))?
    {
        DeleteOutcome::Deleted => Ok(Reply::NoContent),
        DeleteOutcome::NotFound => Err(ApiError::NotFound(NOT_FOUND.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::db::{CustomerParams, CustomerStore};
    use crate::handlers::test_support::context;
    use crate::translate::{CUSTOMER_MISSING, INVOICE_NUMBER_TAKEN};

    fn request(number: &str, customer_id: i32) -> InvoiceRequest {
        InvoiceRequest {
            invoice_number: number.to_string(),
            invoice_date: None,
            customer_id,
        }
    }

    async fn seeded() -> AppContext {
        let ctx = context();
        ctx.db
            .create_customer(&CustomerParams {
                first_name: "Jarred".to_string(),
                last_name: "Black".to_string(),
            })
            .await
            .expect("customer");
        ctx
    }

    #[tokio::test]
    async fn create_defaults_date_to_now() {
        let ctx = seeded().await;
        let before = Utc::now();
        let Reply::Created(body) = create(&ctx, request("INV-1", 1)).await.expect("create") else {
            panic!("expected 201");
        };
        assert_eq!(body["id"], 1);
        assert_eq!(body["invoice_number"], "INV-1");
        let date: DateTime<Utc> =
            serde_json::from_value(body["invoice_date"].clone()).expect("date");
        assert!(date >= before && date <= Utc::now());
    }

    #[tokio::test]
    async fn create_keeps_explicit_date() {
        let ctx = seeded().await;
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).single().expect("date");
        let mut req = request("INV-1", 1);
        req.invoice_date = Some(date);
        let reply = create(&ctx, req).await.expect("create");
        assert_eq!(
            reply,
            Reply::Created(json!({
                "id": 1,
                "invoice_number": "INV-1",
                "invoice_date": date,
                "customer_id": 1
            }))
        );
    }

    #[tokio::test]
    async fn field_validation() {
        let ctx = seeded().await;
        assert_eq!(
            create(&ctx, request(" ", 1)).await,
            Err(ApiError::Validation(INVOICE_NUMBER_REQUIRED.to_string()))
        );
        assert_eq!(
            create(&ctx, request("INV-1", 0)).await,
            Err(ApiError::Validation(CUSTOMER_ID_NOT_POSITIVE.to_string()))
        );
        assert_eq!(
            create(&ctx, request("INV-1", -3)).await,
            Err(ApiError::Validation(CUSTOMER_ID_NOT_POSITIVE.to_string()))
        );
    }

    #[tokio::test]
    async fn unknown_customer_is_a_bad_request() {
        let ctx = seeded().await;
        assert_eq!(
            create(&ctx, request("INV-1", 42)).await,
            Err(ApiError::BadRequest(CUSTOMER_MISSING.to_string()))
        );
    }

    #[tokio::test]
    async fn duplicate_number_conflicts_without_creating_a_row() {
        let ctx = seeded().await;
        create(&ctx, request("INV-1", 1)).await.expect("first");
        assert_eq!(
            create(&ctx, request("INV-1", 1)).await,
            Err(ApiError::DuplicateKey(INVOICE_NUMBER_TAKEN.to_string()))
        );
        let Reply::Ok(body) = list(&ctx).await.expect("list") else {
            panic!("expected 200");
        };
        assert_eq!(body.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn update_requires_a_date() {
        let ctx = seeded().await;
        create(&ctx, request("INV-1", 1)).await.expect("create");
        assert_eq!(
            update(&ctx, 1, request("INV-2", 1)).await,
            Err(ApiError::Validation(INVOICE_DATE_REQUIRED.to_string()))
        );

        let mut req = request("INV-2", 1);
        req.invoice_date = Some(Utc::now());
        let Reply::Ok(body) = update(&ctx, 1, req).await.expect("update") else {
            panic!("expected 200");
        };
        assert_eq!(body["invoice_number"], "INV-2");
    }

    #[tokio::test]
    async fn update_to_another_invoices_number_conflicts() {
        let ctx = seeded().await;
        create(&ctx, request("INV-1", 1)).await.expect("first");
        create(&ctx, request("INV-2", 1)).await.expect("second");

        let mut req = request("INV-1", 1);
        req.invoice_date = Some(Utc::now());
        assert_eq!(
            update(&ctx, 2, req).await,
            Err(ApiError::DuplicateKey(INVOICE_NUMBER_TAKEN.to_string()))
        );

        // Keeping its own number is fine.
        let mut req = request("INV-2", 1);
        req.invoice_date = Some(Utc::now());
        assert!(update(&ctx, 2, req).await.is_ok());
    }

    #[tokio::test]
    async fn missing_invoice_is_not_found() {
        let ctx = seeded().await;
        let not_found = Err(ApiError::NotFound(NOT_FOUND.to_string()));
        let mut req = request("INV-9", 1);
        req.invoice_date = Some(Utc::now());
        assert_eq!(get(&ctx, 9).await, not_found);
        assert_eq!(update(&ctx, 9, req).await, not_found);
        assert_eq!(delete(&ctx, 9).await, not_found);
    }
}
