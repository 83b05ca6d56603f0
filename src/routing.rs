//! Request path resolution.
//!
//! Turns a method and path under [`API_PREFIX`] into a typed [`Route`], so the
//! dispatcher can match exhaustively instead of branching on strings.
//!
//! Recognized shapes (empty segments are ignored, so trailing slashes are
//! tolerated):
//!
//! | Shape | Methods |
//! |---|---|
//! | `/{resource}` | GET, POST |
//! | `/{resource}/{id}` | GET, PATCH, DELETE |
//! | `/invoices/{id}/products` | GET |
//! | `/invoices/{id}/products/{product_id}` | POST, DELETE |

use axum::http::Method;
use thiserror::Error;

pub const API_PREFIX: &str = "/api/v1";

/// Top-level resource collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Customers,
    Products,
    Invoices,
}

impl Resource {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "customers" => Some(Self::Customers),
            "products" => Some(Self::Products),
            "invoices" => Some(Self::Invoices),
            _ => None,
        }
    }

    /// Singular noun used in client-facing messages.
    pub fn singular(self) -> &'static str {
        match self {
            Self::Customers => "customer",
            Self::Products => "product",
            Self::Invoices => "invoice",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionAction {
    List,
    Create,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    Get,
    Update,
    Delete,
}

/// Actions on a single invoice/product pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationAction {
    Upsert,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Collection {
        resource: Resource,
        action: CollectionAction,
    },
    Item {
        resource: Resource,
        id: i32,
        action: ItemAction,
    },
    /// Line items of one invoice (GET only).
    InvoiceProducts { invoice_id: i32 },
    InvoiceProduct {
        invoice_id: i32,
        product_id: i32,
        action: RelationAction,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("Not found")]
    NotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// An identifier segment is not a base-10 `i32`.
    #[error("Invalid {0} ID")]
    InvalidIdentifier(&'static str),
}

/// Resolve `path` (including [`API_PREFIX`]) for `method`.
pub fn resolve(method: &Method, path: &str) -> Result<Route, RouteError> {
    let rest = path.strip_prefix(API_PREFIX).ok_or(RouteError::NotFound)?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return Err(RouteError::NotFound);
    }
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

    let Some((&head, tail)) = segments.split_first() else {
        return Err(RouteError::NotFound);
    };
    let resource = Resource::from_segment(head).ok_or(RouteError::NotFound)?;

    match (resource, tail) {
        (_, []) => collection_route(resource, method),
        (_, [id]) => {
            let id = parse_id(id, resource)?;
            item_route(resource, id, method)
        }
        (Resource::Invoices, [invoice_id, "products"]) => {
            let invoice_id = parse_id(invoice_id, Resource::Invoices)?;
            if *method == Method::GET {
                Ok(Route::InvoiceProducts { invoice_id })
            } else {
                Err(RouteError::MethodNotAllowed)
            }
        }
        (Resource::Invoices, [invoice_id, "products", product_id]) => {
            let invoice_id = parse_id(invoice_id, Resource::Invoices)?;
            let product_id = parse_id(product_id, Resource::Products)?;
            let action = match *method {
                Method::POST => RelationAction::Upsert,
                Method::DELETE => RelationAction::Remove,
                _ => return Err(RouteError::MethodNotAllowed),
            };
            Ok(Route::InvoiceProduct {
                invoice_id,
                product_id,
                action,
            })
        }
        _ => Err(RouteError::NotFound),
    }
}

fn parse_id(segment: &str, resource: Resource) -> Result<i32, RouteError> {
    segment
        .parse::<i32>()
        .map_err(|_| RouteError::InvalidIdentifier(resource.singular()))
}

fn collection_route(resource: Resource, method: &Method) -> Result<Route, RouteError> {
    let action = match *method {
        Method::GET => CollectionAction::List,
        Method::POST => CollectionAction::Create,
        _ => return Err(RouteError::MethodNotAllowed),
    };
    Ok(Route::Collection { resource, action })
}

fn item_route(resource: Resource, id: i32, method: &Method) -> Result<Route, RouteError> {
    let action = match *method {
        Method::GET => ItemAction::Get,
        Method::PATCH => ItemAction::Update,
        Method::DELETE => ItemAction::Delete,
        _ => return Err(RouteError::MethodNotAllowed),
    };
    Ok(Route::Item {
        resource,
        id,
        action,
    })
}
