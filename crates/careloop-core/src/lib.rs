//! # Careloop Core
//!
//! Shared foundation for the Careloop patient-engagement service:
//! configuration loaded from the environment, the error taxonomy, the
//! patient document model, the static template registry, and the
//! `TemplateSender` seam that decouples message delivery from the
//! concrete gateway client.

pub mod config;
pub mod error;
pub mod templates;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{CareloopError, Result};
pub use templates::TemplateRegistry;
pub use traits::TemplateSender;
pub use types::{MeetingDetails, Patient, SendReceipt};
