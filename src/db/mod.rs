//! Database layer: repository handlers and DB-facing models.

pub mod errors;
pub mod handlers;
pub mod models;
