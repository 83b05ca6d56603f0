//! Store failure → client outcome translation.
//!
//! `ConstraintTable` is built once from `db::schema::CONSTRAINTS`. A rejected
//! write is classified by the identity of the constraint that fired, not by its
//! class alone: the same foreign key answers 400 or 404 when the referencing row
//! is written and 409 when the referenced row is deleted.

use std::collections::HashMap;

use crate::db::schema::{self, SchemaConstraint};
use crate::error::{ApiError, ConstraintKind, DatabaseError};

pub const FIRST_NAME_REQUIRED: &str = "First name is required";
pub const LAST_NAME_REQUIRED: &str = "Last name is required";
pub const PRODUCT_NAME_REQUIRED: &str = "Product name is required";
pub const PRODUCT_PRICE_REQUIRED: &str = "Product price is required";
pub const INVALID_PRICE: &str = "Invalid price";
pub const PRICE_NEGATIVE: &str = "price must be greater than or equal to 0";
pub const AVAILABLE_ITEMS_NEGATIVE: &str = "available_items must be greater than or equal to 0";
pub const INVOICE_NUMBER_REQUIRED: &str = "invoice_number must not be empty";
pub const INVOICE_DATE_REQUIRED: &str = "invoice_date must be provided";
pub const CUSTOMER_ID_NOT_POSITIVE: &str = "customer_id should be a positive number";
pub const COUNT_NOT_POSITIVE: &str = "count must be greater than 0";
pub const INVOICE_NUMBER_TAKEN: &str = "Invoice number must be unique";
pub const CUSTOMER_MISSING: &str = "Specified customer does not exist";
pub const PRODUCT_MISSING: &str = "The provided product does not exist";
pub const INVOICE_MISSING: &str = "The provided invoice does not exist";

/// Which side of a relationship the failed statement touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Plain reads. No constraint can fire, so every failure is internal.
    Read,
    /// Insert or update of the row holding the constraint.
    Write,
    /// Removal of a row another table may reference.
    Delete,
}

#[derive(Debug, Clone, Copy)]
enum Class {
    Validation,
    BadRequest,
    NotFound,
    Duplicate,
}

/// Outcomes for violations raised while writing the constrained row.
const WRITE_RULES: &[(&str, Class, &str)] = &[
    (schema::CUSTOMER_FIRST_NAME_CHECK, Class::Validation, FIRST_NAME_REQUIRED),
    (schema::CUSTOMER_LAST_NAME_CHECK, Class::Validation, LAST_NAME_REQUIRED),
    (schema::PRODUCT_NAME_CHECK, Class::Validation, PRODUCT_NAME_REQUIRED),
    (schema::PRODUCT_PRICE_CHECK, Class::Validation, PRICE_NEGATIVE),
    (schema::PRODUCT_AVAILABLE_ITEMS_CHECK, Class::Validation, AVAILABLE_ITEMS_NEGATIVE),
    (schema::INVOICE_NUMBER_KEY, Class::Duplicate, INVOICE_NUMBER_TAKEN),
    (schema::INVOICE_NUMBER_CHECK, Class::Validation, INVOICE_NUMBER_REQUIRED),
    (schema::INVOICE_CUSTOMER_FKEY, Class::BadRequest, CUSTOMER_MISSING),
    (schema::INVOICE_ITEM_COUNT_CHECK, Class::Validation, COUNT_NOT_POSITIVE),
    (schema::INVOICE_ITEM_INVOICE_FKEY, Class::NotFound, INVOICE_MISSING),
    (schema::INVOICE_ITEM_PRODUCT_FKEY, Class::NotFound, PRODUCT_MISSING),
];

impl Class {
    fn error(self, message: &str) -> ApiError {
        let message = message.to_string();
        match self {
            Self::Validation => ApiError::Validation(message),
            Self::BadRequest => ApiError::BadRequest(message),
            Self::NotFound => ApiError::NotFound(message),
            Self::Duplicate => ApiError::DuplicateKey(message),
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    kind: ConstraintKind,
    on_write: Option<ApiError>,
    on_delete: Option<ApiError>,
}

/// Constraint identity → client outcome.
#[derive(Debug, Clone)]
pub struct ConstraintTable {
    rules: HashMap<String, Rule>,
}

impl ConstraintTable {
    pub fn from_schema(constraints: &[SchemaConstraint]) -> Self {
        let rules = constraints
            .iter()
            .map(|c| {
                let on_write = WRITE_RULES
                    .iter()
                    .find(|(name, _, _)| *name == c.name)
                    .map(|(_, class, message)| class.error(message));
                let on_delete = match (c.kind, c.references) {
                    (ConstraintKind::ForeignKey, Some(parent)) => {
                        Some(ApiError::ReferentialConflict(format!(
                            "cannot delete {parent}: {parent} is referenced in the {} table",
                            c.table
                        )))
                    }
                    _ => None,
                };
                let rule = Rule {
                    kind: c.kind,
                    on_write,
                    on_delete,
                };
                (c.name.to_string(), rule)
            })
            .collect();
        Self { rules }
    }

    fn lookup(&self, kind: ConstraintKind, constraint: &str, action: Action) -> Option<&ApiError> {
        let rule = self.rules.get(constraint).filter(|r| r.kind == kind)?;
        match action {
            Action::Read => None,
            Action::Write => rule.on_write.as_ref(),
            Action::Delete => rule.on_delete.as_ref(),
        }
    }

    /// Classify a store failure. Anything without a rule is `Internal`.
    ///
    /// Faults are logged here, with their cause. Mapped outcomes are client
    /// errors and are logged with the rest of them by the request handler.
    pub fn translate(&self, err: &DatabaseError, action: Action) -> ApiError {
        match err {
            DatabaseError::Constraint { kind, constraint } => {
                match self.lookup(*kind, constraint, action) {
                    Some(outcome) => outcome.clone(),
                    None => {
                        tracing::error!(
                            %constraint,
                            %kind,
                            ?action,
                            "Unmapped constraint violation"
                        );
                        ApiError::Internal
                    }
                }
            }
            other => {
                tracing::error!(error = %other, ?action, "Store operation failed");
                ApiError::Internal
            }
        }
    }
}

impl Default for ConstraintTable {
    fn default() -> Self {
        Self::from_schema(schema::CONSTRAINTS)
    }
}
