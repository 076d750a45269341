//! Deferred delivery data model.

use chrono::{DateTime, Duration, Utc};

use careloop_core::types::Patient;

/// Delay before DAY1 fires — a near-immediate confirmation.
pub const FIRST_DAY_DELAY_SECS: i64 = 5;
/// Delay before each of DAY2..DAY7 fires, counted from registration.
pub const DAILY_DELAY_SECS: i64 = 86_400;
/// Days in a plan.
pub const PLAN_DAYS: u8 = 7;

/// Lifecycle of one delivery. There is no Cancelled state: once
/// registered, a delivery cannot be withdrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Scheduled,
    Fired,
    Completed,
}

/// One scheduled plan message. Plain data: the patient snapshot is owned,
/// so nothing here re-reads the store when the delivery fires.
#[derive(Debug, Clone)]
pub struct PlanDelivery {
    pub id: String,
    pub patient: Patient,
    pub plan_type: String,
    pub day_num: u8,
    pub fire_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status: DeliveryStatus,
}

impl PlanDelivery {
    pub fn new(
        patient: Patient,
        plan_type: &str,
        day_num: u8,
        delay_secs: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("delivery-{}", uuid::Uuid::new_v4()),
            patient,
            plan_type: plan_type.to_string(),
            day_num,
            fire_at: now + Duration::seconds(delay_secs),
            created_at: now,
            status: DeliveryStatus::Scheduled,
        }
    }

    pub fn day_key(&self) -> String {
        format!("DAY{}", self.day_num)
    }

    /// The day's content from the snapshot, or the placeholder when the
    /// stored plan has no entry for this day.
    pub fn plan_text(&self) -> String {
        let day_key = self.day_key();
        self.patient
            .plan_for(&self.plan_type, &day_key)
            .map(str::to_string)
            .unwrap_or_else(|| format!("No {} plan for {}", self.plan_type, day_key))
    }

    /// Human-readable line logged when the delivery fires.
    pub fn log_line(&self) -> String {
        format!(
            "{} plan for {} for {}: {}",
            capitalize(&self.plan_type),
            self.day_key(),
            self.patient.name,
            self.plan_text()
        )
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.fire_at <= now
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}
