//! # Careloop Scheduler
//!
//! Minimal in-process deferred-task scheduler for 7-day message plans.
//! Best-effort by design: deliveries live only in memory, fire once, and
//! are dropped on process shutdown. Not a message queue.
//!
//! ## Architecture
//! ```text
//! plan activation
//!   ├── immediate greeting (request path, synchronous)
//!   └── schedule_plan → 7 PlanDelivery entries in a fire-time min-heap
//!                         DAY1 at +5s, DAY2..DAY7 at +86400s each
//!
//! delivery loop (tokio interval, 1s tick)
//!   └── pop_due → resolve template → send via TemplateSender → log
//!       failures are terminal-but-silent; remaining tasks unaffected
//! ```
//!
//! Each delivery carries the patient snapshot captured at registration;
//! a later edit to the stored record does not change what fires.

pub mod engine;
pub mod tasks;

pub use engine::{SchedulerEngine, fire_delivery, spawn_delivery_loop};
pub use tasks::{DeliveryStatus, PlanDelivery};
