//! Relational schema and the integrity constraints it names.
//!
//! The constraint names below are the contract between the store backends and
//! `translate::ConstraintTable`: backends report violations under these names,
//! and the translator maps each name to a client-facing outcome.

use crate::error::ConstraintKind;

/// Idempotent DDL for a fresh database.
pub const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Characters the non-blank text checks strip, as in `btrim(x, E' \t\r\n')`.
pub const BLANK_CHARS: &[char] = &[' ', '\t', '\r', '\n'];

pub const CUSTOMER_FIRST_NAME_CHECK: &str = "customer_first_name_check";
pub const CUSTOMER_LAST_NAME_CHECK: &str = "customer_last_name_check";

pub const PRODUCT_NAME_CHECK: &str = "product_name_check";
pub const PRODUCT_PRICE_CHECK: &str = "product_price_check";
pub const PRODUCT_AVAILABLE_ITEMS_CHECK: &str = "product_available_items_check";

pub const INVOICE_NUMBER_KEY: &str = "invoice_invoice_number_key";
pub const INVOICE_NUMBER_CHECK: &str = "invoice_invoice_number_check";
pub const INVOICE_CUSTOMER_FKEY: &str = "invoice_customer_id_fkey";

pub const INVOICE_ITEM_COUNT_CHECK: &str = "invoice_item_count_check";
pub const INVOICE_ITEM_PAIR_KEY: &str = "invoice_item_invoice_id_product_id_key";
pub const INVOICE_ITEM_INVOICE_FKEY: &str = "invoice_item_invoice_id_fkey";
pub const INVOICE_ITEM_PRODUCT_FKEY: &str = "invoice_item_product_id_fkey";

/// A named constraint declared by `schema.sql`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaConstraint {
    pub name: &'static str,
    pub kind: ConstraintKind,
    pub table: &'static str,
    /// Parent table for foreign keys.
    pub references: Option<&'static str>,
}

const fn check(name: &'static str, table: &'static str) -> SchemaConstraint {
    SchemaConstraint {
        name,
        kind: ConstraintKind::Check,
        table,
        references: None,
    }
}

/// Every named constraint in the schema.
pub const CONSTRAINTS: &[SchemaConstraint] = &[
    check(CUSTOMER_FIRST_NAME_CHECK, "customer"),
    check(CUSTOMER_LAST_NAME_CHECK, "customer"),
    check(PRODUCT_NAME_CHECK, "product"),
    check(PRODUCT_PRICE_CHECK, "product"),
    check(PRODUCT_AVAILABLE_ITEMS_CHECK, "product"),
    SchemaConstraint {
        name: INVOICE_NUMBER_KEY,
        kind: ConstraintKind::Unique,
        table: "invoice",
        references: None,
    },
    check(INVOICE_NUMBER_CHECK, "invoice"),
    SchemaConstraint {
        name: INVOICE_CUSTOMER_FKEY,
        kind: ConstraintKind::ForeignKey,
        table: "invoice",
        references: Some("customer"),
    },
    check(INVOICE_ITEM_COUNT_CHECK, "invoice_item"),
    SchemaConstraint {
        name: INVOICE_ITEM_PAIR_KEY,
        kind: ConstraintKind::Unique,
        table: "invoice_item",
        references: None,
    },
    SchemaConstraint {
        name: INVOICE_ITEM_INVOICE_FKEY,
        kind: ConstraintKind::ForeignKey,
        table: "invoice_item",
        references: Some("invoice"),
    },
    SchemaConstraint {
        name: INVOICE_ITEM_PRODUCT_FKEY,
        kind: ConstraintKind::ForeignKey,
        table: "invoice_item",
        references: Some("product"),
    },
];

pub fn find_constraint(name: &str) -> Option<&'static SchemaConstraint> {
    CONSTRAINTS.iter().find(|c| c.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_constraint_is_declared_in_the_ddl() {
        for constraint in CONSTRAINTS {
            assert!(
                SCHEMA_SQL.contains(&format!("CONSTRAINT {} ", constraint.name)),
                "{} missing from schema.sql",
                constraint.name
            );
        }
    }

    #[test]
    fn foreign_keys_name_their_parent_table() {
        for constraint in CONSTRAINTS {
            assert_eq!(
                constraint.kind == ConstraintKind::ForeignKey,
                constraint.references.is_some(),
                "{}",
                constraint.name
            );
        }
    }

    #[test]
    fn schema_never_cascades_deletes() {
        assert!(!SCHEMA_SQL.to_ascii_uppercase().contains("CASCADE"));
    }
}
