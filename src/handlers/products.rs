//! Product resource.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::db::{DeleteOutcome, LIST_LIMIT, ProductParams, ProductStore, to_money};
use crate::error::ApiError;
use crate::handlers::{AppContext, Reply, decode_body};
use crate::routing::{CollectionAction, ItemAction};
use crate::translate::{
    AVAILABLE_ITEMS_NEGATIVE, Action, INVALID_PRICE, PRICE_NEGATIVE, PRODUCT_NAME_REQUIRED,
    PRODUCT_PRICE_REQUIRED,
};
use crate::web::types::{ProductInfo, ProductRequest};

pub const NOT_FOUND: &str = "Product not found";

/// `NUMERIC(10,2)` holds at most eight integer digits.
const PRICE_CEILING: i64 = 100_000_000;

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

fn parse_price(raw: &str) -> Result<Decimal, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::Validation(PRODUCT_PRICE_REQUIRED.to_string()));
    }
    let price = Decimal::from_str(raw)
        .map(to_money)
        .map_err(|_| ApiError::Validation(INVALID_PRICE.to_string()))?;
    if price < Decimal::ZERO {
        return Err(ApiError::Validation(PRICE_NEGATIVE.to_string()));
    }
    if price >= Decimal::from(PRICE_CEILING) {
        return Err(ApiError::Validation(INVALID_PRICE.to_string()));
    }
    Ok(price)
}

fn validate(req: ProductRequest) -> Result<ProductParams, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation(PRODUCT_NAME_REQUIRED.to_string()));
    }
    let price = parse_price(&req.price)?;
    if req.available_items < 0 {
        return Err(ApiError::Validation(AVAILABLE_ITEMS_NEGATIVE.to_string()));
    }
    let description = if req.description.trim().is_empty() {
        None
    } else {
        Some(req.description)
    };
    Ok(ProductParams {
        name: req.name,
        description,
        price,
        available_items: req.available_items,
    })
}

pub async fn list(ctx: &AppContext) -> Result<Reply, ApiError> {
    let rows = ctx
        .db
        .list_products(LIST_LIMIT)
        .await
        .map_err(ctx.store_error(Action::Read))?;
    let products: Vec<ProductInfo> = rows.into_iter().map(ProductInfo::from).collect();
    Reply::ok(&products)
}

pub async fn create(ctx: &AppContext, req: ProductRequest) -> Result<Reply, ApiError> {
    let params = validate(req)?;
    let row = ctx
        .db
        .create_product(&params)
        .await
        .map_err(ctx.store_error(Action::Write))?;
    tracing::debug!(id = row.id, "Created product");
    Reply::created(&ProductInfo::from(row))
}

pub async fn get(ctx: &AppContext, id: i32) -> Result<Reply, ApiError> {
    let row = ctx
        .db
        .get_product(id)
        .await
        .map_err(ctx.store_error(Action::Read))?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;
    Reply::ok(&ProductInfo::from(row))
}

pub async fn update(ctx: &AppContext, id: i32, req: ProductRequest) -> Result<Reply, ApiError> {
    let params = validate(req)?;
    let row = ctx
        .db
        .update_product(id, &params)
        .await
        .map_err(ctx.store_error(Action::Write))?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;
    Reply::ok(&ProductInfo::from(row))
}

pub async fn delete(ctx: &AppContext, id: i32) -> Result<Reply, ApiError> {
    match ctx
        .db
        .delete_product(id)
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
    use crate::handlers::test_support::context;

    fn request(name: &str, price: &str, available_items: i32) -> ProductRequest {
        ProductRequest {
            name: name.to_string(),
            description: String::new(),
            price: price.to_string(),
            available_items,
        }
    }

    fn validation(message: &str) -> Result<Reply, ApiError> {
        Err(ApiError::Validation(message.to_string()))
    }

    #[test]
    fn price_parsing() {
        assert_eq!(parse_price("222").map(|p| p.to_string()), Ok("222.00".to_string()));
        assert_eq!(parse_price(" 19.999 ").map(|p| p.to_string()), Ok("20.00".to_string()));
        assert_eq!(parse_price("0").map(|p| p.to_string()), Ok("0.00".to_string()));
        assert_eq!(
            parse_price(""),
            Err(ApiError::Validation(PRODUCT_PRICE_REQUIRED.to_string()))
        );
        assert_eq!(
            parse_price("twelve"),
            Err(ApiError::Validation(INVALID_PRICE.to_string()))
        );
        assert_eq!(
            parse_price("-1.50"),
            Err(ApiError::Validation(PRICE_NEGATIVE.to_string()))
        );
        assert_eq!(
            parse_price("100000000"),
            Err(ApiError::Validation(INVALID_PRICE.to_string()))
        );
    }

    #[tokio::test]
    async fn create_normalizes_price() {
        let ctx = context();
        let reply = create(&ctx, request("Mouse", "222", 22)).await.expect("create");
        assert_eq!(
            reply,
            Reply::Created(json!({
                "id": 1,
                "name": "Mouse",
                "description": "",
                "price": "222.00",
                "available_items": 22
            }))
        );
    }

    #[tokio::test]
    async fn invalid_fields_are_rejected() {
        let ctx = context();
        assert_eq!(
            create(&ctx, request(" ", "1", 0)).await,
            validation(PRODUCT_NAME_REQUIRED)
        );
        assert_eq!(
            create(&ctx, request("Mouse", "", 0)).await,
            validation(PRODUCT_PRICE_REQUIRED)
        );
        assert_eq!(
            create(&ctx, request("Mouse", "1", -1)).await,
            validation(AVAILABLE_ITEMS_NEGATIVE)
        );
        assert_eq!(list(&ctx).await, Ok(Reply::Ok(json!([]))));
    }

    #[tokio::test]
    async fn description_round_trips() {
        let ctx = context();
        let mut req = request("Keyboard", "49.90", 3);
        req.description = "mechanical".to_string();
        create(&ctx, req).await.expect("create");

        let Reply::Ok(body) = get(&ctx, 1).await.expect("get") else {
            panic!("expected 200");
        };
        assert_eq!(body["description"], "mechanical");
        assert_eq!(body["price"], "49.90");
    }

    #[tokio::test]
    async fn update_and_delete() {
        let ctx = context();
        create(&ctx, request("Mouse", "222", 22)).await.expect("create");

        let Reply::Ok(body) = update(&ctx, 1, request("Mouse", "199.5", 10))
            .await
            .expect("update")
        else {
            panic!("expected 200");
        };
        assert_eq!(body["price"], "199.50");
        assert_eq!(body["available_items"], 10);

        assert_eq!(delete(&ctx, 1).await, Ok(Reply::NoContent));
        assert_eq!(
            delete(&ctx, 1).await,
            Err(ApiError::NotFound(NOT_FOUND.to_string()))
        );
        assert_eq!(
            update(&ctx, 1, request("Mouse", "1", 1)).await,
            Err(ApiError::NotFound(NOT_FOUND.to_string()))
        );
    }
}
