//! Resource-oriented HTTP API for customers, products, invoices, and the
//! products on each invoice.
//!
//! A request flows through four layers:
//!
//! 1. [`routing`] resolves method and path into a typed [`routing::Route`].
//! 2. [`handlers`] validate input and call the store.
//! 3. [`db`] persists through the [`db::Database`] trait (PostgreSQL or in-memory).
//! 4. [`translate`] turns store failures into client outcomes by constraint identity.
//!
//! [`web`] wires these into an axum router.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod routing;
pub mod translate;
pub mod web;
