//! Seams between components.

use async_trait::async_trait;

use crate::types::SendReceipt;

/// Anything that can deliver a templated message to one recipient.
///
/// The deferred scheduler is written against this trait so its delivery
/// path can be driven by a recording mock in tests; the production
/// implementation is the WhatsApp gateway client. Parameter order is
/// positional and must match the provider template's placeholders.
#[async_trait]
pub trait TemplateSender: Send + Sync {
    async fn send_template(&self, template: &str, to: &str, params: &[String]) -> SendReceipt;
}
