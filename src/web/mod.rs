//! HTTP surface: DTOs, response rendering, and the axum server.

pub mod response;
pub mod server;
pub mod types;

pub use server::{build_router, start_server};
