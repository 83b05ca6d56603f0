//! Customer resource.

use crate::db::{CustomerParams, CustomerStore, DeleteOutcome, LIST_LIMIT};
use crate::error::ApiError;
use crate::handlers::{AppContext, Reply, decode_body};
use crate::routing::{CollectionAction, ItemAction};
use crate::translate::{Action, FIRST_NAME_REQUIRED, LAST_NAME_REQUIRED};
use crate::web::types::{CustomerInfo, CustomerRequest};

pub const NOT_FOUND: &str = "Customer not found";

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

fn validate(req: CustomerRequest) -> Result<CustomerParams, ApiError> {
    if req.first_name.trim().is_empty() {
        return Err(ApiError::Validation(FIRST_NAME_REQUIRED.to_string()));
    }
    if req.last_name.trim().is_empty() {
        return Err(ApiError::Validation(LAST_NAME_REQUIRED.to_string()));
    }
    Ok(CustomerParams {
        first_name: req.first_name,
        last_name: req.last_name,
    })
}

pub async fn list(ctx: &AppContext) -> Result<Reply, ApiError> {
    let rows = ctx
        .db
        .list_customers(LIST_LIMIT)
        .await
        .map_err(ctx.store_error(Action::Read))?;
    let customers: Vec<CustomerInfo> = rows.into_iter().map(CustomerInfo::from).collect();
    Reply::ok(&customers)
}

pub async fn create(ctx: &AppContext, req: CustomerRequest) -> Result<Reply, ApiError> {
    let params = validate(req)?;
    let row = ctx
        .db
        .create_customer(&params)
        .await
        .map_err(ctx.store_error(Action::Write))?;
    tracing::debug!(id = row.id, "Created customer");
    Reply::created(&CustomerInfo::from(row))
}

pub async fn get(ctx: &AppContext, id: i32) -> Result<Reply, ApiError> {
    let row = ctx
        .db
        .get_customer(id)
        .await
        .map_err(ctx.store_error(Action::Read))?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;
    Reply::ok(&CustomerInfo::from(row))
}

pub async fn update(ctx: &AppContext, id: i32, req: CustomerRequest) -> Result<Reply, ApiError> {
    let params = validate(req)?;
    let row = ctx
        .db
        .update_customer(id, &params)
        .await
        .map_err(ctx.store_error(Action::Write))?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;
    Reply::ok(&CustomerInfo::from(row))
}

pub async fn delete(ctx: &AppContext, id: i32) -> Result<Reply, ApiError> {
    match ctx
        .db
        .delete_customer(id)
        .await
        .map_err(ctx.store_error(Action::Delete))?
    {
        DeleteOutcome::Deleted => Ok(Reply::NoContent),
        DeleteOutcome::NotFound => Err(ApiError::NotFound(NOT_FOUND.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::db::{InvoiceParams, InvoiceStore};
    use crate::handlers::test_support::context;

    fn request(first: &str, last: &str) -> CustomerRequest {
        CustomerRequest {
            first_name: first.to_string(),
            last_name: last.to_string(),
        }
    }

    #[tokio::test]
    async fn create_returns_input_with_new_id() {
        let ctx = context();
        let reply = create(&ctx, request("Jarred", "Black")).await.expect("create");
        assert_eq!(
            reply,
            Reply::Created(json!({"id": 1, "first_name": "Jarred", "last_name": "Black"}))
        );
        let reply = create(&ctx, request("Ann", "Lee")).await.expect("create");
        assert_eq!(
            reply,
            Reply::Created(json!({"id": 2, "first_name": "Ann", "last_name": "Lee"}))
        );
    }

    #[tokio::test]
    async fn blank_names_are_rejected_before_the_store() {
        let ctx = context();
        assert_eq!(
            create(&ctx, request("  ", "Black")).await,
            Err(ApiError::Validation(FIRST_NAME_REQUIRED.to_string()))
        );
        assert_eq!(
            create(&ctx, request("Jarred", "")).await,
            Err(ApiError::Validation(LAST_NAME_REQUIRED.to_string()))
        );
        assert_eq!(list(&ctx).await, Ok(Reply::Ok(json!([]))));
    }

    #[tokio::test]
    async fn missing_customer_is_not_found_everywhere() {
        let ctx = context();
        let not_found = Err(ApiError::NotFound(NOT_FOUND.to_string()));
        assert_eq!(get(&ctx, 5).await, not_found);
        assert_eq!(update(&ctx, 5, request("A", "B")).await, not_found);
        assert_eq!(delete(&ctx, 5).await, not_found);
    }

    #[tokio::test]
    async fn update_replaces_names() {
        let ctx = context();
        create(&ctx, request("Jarred", "Black")).await.expect("create");
        let reply = update(&ctx, 1, request("Jared", "White")).await.expect("update");
        assert_eq!(
            reply,
            Reply::Ok(json!({"id": 1, "first_name": "Jared", "last_name": "White"}))
        );
    }

    #[tokio::test]
    async fn delete_is_refused_while_invoices_reference_the_customer() {
        let ctx = context();
        create(&ctx, request("Jarred", "Black")).await.expect("create");
        ctx.db
            .create_invoice(&InvoiceParams {
                invoice_number: "INV-1".to_string(),
                invoice_date: chrono::Utc::now(),
                customer_id: 1,
            })
            .await
            .expect("invoice");

        assert_eq!(
            delete(&ctx, 1).await,
            Err(ApiError::ReferentialConflict(
                "cannot delete customer: customer is referenced in the invoice table".to_string()
            ))
        );
        assert!(get(&ctx, 1).await.is_ok());

        ctx.db.delete_invoice(1).await.expect("delete invoice");
        assert_eq!(delete(&ctx, 1).await, Ok(Reply::NoContent));
        assert_eq!(
            get(&ctx, 1).await,
            Err(ApiError::NotFound(NOT_FOUND.to_string()))
        );
    }
}
