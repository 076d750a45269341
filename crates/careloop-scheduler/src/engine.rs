//! Scheduler engine — fire-time ordered queue plus the delivery loop.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use careloop_core::TemplateRegistry;
use careloop_core::traits::TemplateSender;
use careloop_core::types::Patient;

use crate::tasks::{
    DAILY_DELAY_SECS, DeliveryStatus, FIRST_DAY_DELAY_SECS, PLAN_DAYS, PlanDelivery,
};

/// Heap entry ordered by fire time, id as a stable tie-break.
struct QueuedDelivery(PlanDelivery);

impl PartialEq for QueuedDelivery {
    fn eq(&self, other: &Self) -> bool {
        self.0.fire_at == other.0.fire_at && self.0.id == other.0.id
    }
}

impl Eq for QueuedDelivery {}

impl PartialOrd for QueuedDelivery {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedDelivery {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .fire_at
            .cmp(&other.0.fire_at)
            .then_with(|| self.0.id.cmp(&other.0.id))
    }
}

/// The deferred-delivery queue. One instance per process, polled by
/// [`spawn_delivery_loop`].
pub struct SchedulerEngine {
    queue: BinaryHeap<Reverse<QueuedDelivery>>,
}

impl SchedulerEngine {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
        }
    }

    /// Register a single delivery.
    pub fn schedule(&mut self, delivery: PlanDelivery) {
        tracing::debug!(
            "Delivery scheduled: {} {} for patient {} at {}",
            delivery.plan_type,
            delivery.day_key(),
            delivery.patient.patientid,
            delivery.fire_at
        );
        self.queue.push(Reverse(QueuedDelivery(delivery)));
    }

    /// Register the full 7-day fan-out for one activation. DAY1 gets the
    /// short confirmation delay; DAY2..DAY7 each count a full day from
    /// `now`, independently, not chained to the previous day's firing.
    /// Returns the number of deliveries registered.
    pub fn schedule_plan(&mut self, patient: Patient, plan_type: &str, now: DateTime<Utc>) -> usize {
        let mut registered = 0;
        for day_num in 1..=PLAN_DAYS {
            let delay = if day_num == 1 {
                FIRST_DAY_DELAY_SECS
            } else {
                DAILY_DELAY_SECS
            };
            self.schedule(PlanDelivery::new(patient.clone(), plan_type, day_num, delay, now));
            registered += 1;
        }
        tracing::info!(
            "Registered {registered} {plan_type} deliveries for patient {}",
            patient.patientid
        );
        registered
    }

    /// Drain every delivery whose fire time has passed, soonest first.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Vec<PlanDelivery> {
        let mut due = Vec::new();
        while let Some(Reverse(next)) = self.queue.peek() {
            if !next.0.is_due(now) {
                break;
            }
            let Reverse(QueuedDelivery(delivery)) = self.queue.pop().unwrap();
            due.push(delivery);
        }
        due
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn next_fire_at(&self) -> Option<DateTime<Utc>> {
        self.queue.peek().map(|Reverse(entry)| entry.0.fire_at)
    }
}

impl Default for SchedulerEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Fire one delivery: resolve the template, send, log the outcome. A
/// failed send is not retried and does not touch the other deliveries.
pub async fn fire_delivery(
    delivery: &mut PlanDelivery,
    sender: &dyn TemplateSender,
    templates: &TemplateRegistry,
) {
    delivery.status = DeliveryStatus::Fired;

    let Some(template) = templates.resolve(&delivery.plan_type) else {
        tracing::warn!(
            "No template mapped for plan type '{}'; dropping {} for patient {}",
            delivery.plan_type,
            delivery.day_key(),
            delivery.patient.patientid
        );
        delivery.status = DeliveryStatus::Completed;
        return;
    };

    tracing::info!("{}", delivery.log_line());
    let params = [delivery.patient.name.clone(), delivery.plan_text()];
    let receipt = sender
        .send_template(template, &delivery.patient.mobileno, &params)
        .await;
    if !receipt.delivered {
        tracing::warn!(
            "Delivery {} ({} {}) failed and will not be retried: {}",
            delivery.id,
            delivery.plan_type,
            delivery.day_key(),
            receipt.error.as_deref().unwrap_or("unknown error")
        );
    }

    delivery.status = DeliveryStatus::Completed;
}

/// Run the delivery loop: tick, drain due deliveries, fire each in turn.
/// Spawn this once at startup; it never returns.
pub async fn spawn_delivery_loop(
    engine: Arc<Mutex<SchedulerEngine>>,
    sender: Arc<dyn TemplateSender>,
    templates: Arc<TemplateRegistry>,
    check_interval_secs: u64,
) {
    tracing::info!("Delivery loop started (check every {check_interval_secs}s)");
    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(check_interval_secs.max(1)));

    loop {
        interval.tick().await;
        let due = {
            let mut engine = engine.lock().await;
            engine.pop_due(Utc::now())
        };
        for mut delivery in due {
            fire_delivery(&mut delivery, sender.as_ref(), &templates).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{DAILY_DELAY_SECS, FIRST_DAY_DELAY_SECS};
    use async_trait::async_trait;
    use careloop_core::types::SendReceipt;
    use chrono::Duration;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    fn asha() -> Patient {
        serde_json::from_value(json!({
            "patientid": 101,
            "name": "Asha",
            "mobileno": "9990001111",
            "DIET_PLAN": {
                "DAY1": "Oats breakfast",
                "DAY2": "Salad lunch",
                "DAY3": "Khichdi dinner"
            }
        }))
        .unwrap()
    }

    #[derive(Default)]
    struct RecordingSender {
        sent: StdMutex<Vec<(String, String, Vec<String>)>>,
    }

    #[async_trait]
    impl TemplateSender for RecordingSender {
        async fn send_template(&self, template: &str, to: &str, params: &[String]) -> SendReceipt {
            self.sent.lock().unwrap().push((
                template.to_string(),
                to.to_string(),
                params.to_vec(),
            ));
            SendReceipt::delivered(json!({"status": "accepted"}))
        }
    }

    struct FailingSender;

    #[async_trait]
    impl TemplateSender for FailingSender {
        async fn send_template(&self, _: &str, _: &str, _: &[String]) -> SendReceipt {
            SendReceipt::failed("status 500: provider down")
        }
    }

    #[test]
    fn test_schedule_plan_registers_seven_with_expected_offsets() {
        let now = Utc::now();
        let mut engine = SchedulerEngine::new();
        assert_eq!(engine.schedule_plan(asha(), "Diet", now), 7);
        assert_eq!(engine.pending(), 7);

        let all = engine.pop_due(now + Duration::days(2));
        assert_eq!(all.len(), 7);
        assert_eq!(all[0].day_num, 1);
        assert_eq!(all[0].fire_at - now, Duration::seconds(FIRST_DAY_DELAY_SECS));
        for delivery in &all[1..] {
            assert_eq!(delivery.fire_at - now, Duration::seconds(DAILY_DELAY_SECS));
        }
    }

    #[test]
    fn test_pop_due_returns_only_elapsed() {
        let now = Utc::now();
        let mut engine = SchedulerEngine::new();
        engine.schedule_plan(asha(), "Diet", now);

        assert!(engine.pop_due(now).is_empty());

        let due = engine.pop_due(now + Duration::seconds(FIRST_DAY_DELAY_SECS));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].day_num, 1);
        assert_eq!(engine.pending(), 6);

        let rest = engine.pop_due(now + Duration::seconds(DAILY_DELAY_SECS));
        assert_eq!(rest.len(), 6);
    }

    #[test]
    fn test_snapshot_survives_later_mutation() {
        let now = Utc::now();
        let mut patient = asha();
        let mut engine = SchedulerEngine::new();
        engine.schedule_plan(patient.clone(), "Diet", now);

        // Simulates the stored record changing after activation.
        patient
            .extra
            .insert("DIET_PLAN".into(), json!({"DAY1": "Changed"}));

        let due = engine.pop_due(now + Duration::seconds(FIRST_DAY_DELAY_SECS));
        assert_eq!(due[0].plan_text(), "Oats breakfast");
    }

    #[tokio::test]
    async fn test_fire_delivery_sends_name_then_plan() {
        let sender = RecordingSender::default();
        let templates = TemplateRegistry::new();
        let mut delivery =
            PlanDelivery::new(asha(), "Diet", 1, FIRST_DAY_DELAY_SECS, Utc::now());

        fire_delivery(&mut delivery, &sender, &templates).await;

        assert_eq!(delivery.status, DeliveryStatus::Completed);
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (template, to, params) = &sent[0];
        assert_eq!(template, "diet_plan_temp");
        assert_eq!(to, "9990001111");
        assert_eq!(params, &vec!["Asha".to_string(), "Oats breakfast".to_string()]);
    }

    #[tokio::test]
    async fn test_fire_delivery_sends_fallback_for_missing_day() {
        let sender = RecordingSender::default();
        let templates = TemplateRegistry::new();
        let mut delivery = PlanDelivery::new(asha(), "Diet", 6, DAILY_DELAY_SECS, Utc::now());

        fire_delivery(&mut delivery, &sender, &templates).await;

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent[0].2[1], "No Diet plan for DAY6");
    }

    #[tokio::test]
    async fn test_unmapped_plan_type_skips_send() {
        let sender = RecordingSender::default();
        let templates = TemplateRegistry::new();
        let mut delivery = PlanDelivery::new(asha(), "Sleep", 1, FIRST_DAY_DELAY_SECS, Utc::now());

        fire_delivery(&mut delivery, &sender, &templates).await;

        assert_eq!(delivery.status, DeliveryStatus::Completed);
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_send_completes_without_retry() {
        let templates = TemplateRegistry::new();
        let mut delivery =
            PlanDelivery::new(asha(), "Diet", 2, DAILY_DELAY_SECS, Utc::now());

        fire_delivery(&mut delivery, &FailingSender, &templates).await;

        assert_eq!(delivery.status, DeliveryStatus::Completed);
    }
}
