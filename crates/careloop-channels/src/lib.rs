//! # Careloop Channels
//!
//! Clients for the three outbound collaborators: the templated WhatsApp
//! messaging provider, the SMTP mail relay, and the Google Calendar API.
//! Each is a narrow request/response wrapper; none retries.

pub mod calendar;
pub mod email;
pub mod whatsapp;

pub use calendar::CalendarClient;
pub use email::Mailer;
pub use whatsapp::WhatsAppGateway;
