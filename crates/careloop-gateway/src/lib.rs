//! # Careloop Gateway
//!
//! Axum HTTP API over the patient store, messaging gateway, scheduler,
//! mailer, and calendar client.

pub mod error;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, build_router, start};
