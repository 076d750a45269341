//! Patient document model and messaging receipts.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// A patient record as stored in the document store.
///
/// Plan data lives in dynamically named fields (`DIET_PLAN`, `EXERCISE_PLAN`,
/// …), each a map of `DAY1`..`DAY7` to free text; those land in `extra`
/// together with the loosely typed vitals the health summary reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub patientid: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mobileno: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Currently active plan type; mutated only by plan activation.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub plan_type: Option<String>,
    /// Timestamp of the last plan activation. Always serializes as an
    /// ISO-8601 string.
    #[serde(
        default,
        deserialize_with = "deserialize_instant",
        skip_serializing_if = "Option::is_none"
    )]
    pub time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_details: Option<MeetingDetails>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Meeting metadata persisted onto the patient after scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingDetails {
    #[serde(default)]
    pub meeting_link: String,
    #[serde(default)]
    pub meeting_datetime: String,
    #[serde(default)]
    pub scheduled_at: String,
    #[serde(default)]
    pub email_sent: bool,
}

impl Patient {
    /// Look up one day's content of a plan, e.g. `plan_for("Diet", "DAY1")`
    /// reads `DIET_PLAN.DAY1`.
    pub fn plan_for(&self, plan_type: &str, day_key: &str) -> Option<&str> {
        let field = format!("{}_PLAN", plan_type.to_uppercase());
        self.extra
            .get(&field)
            .and_then(|days| days.get(day_key))
            .and_then(|value| value.as_str())
    }

    /// Loosely typed field rendered for display, `"N/A"` when absent.
    pub fn display_field(&self, key: &str) -> String {
        match self.extra.get(key) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::Bool(b)) => b.to_string(),
            _ => "N/A".into(),
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { "Unknown" } else { &self.name }
    }
}

/// Outcome of one templated message send.
///
/// The gateway never raises on delivery failure: a non-200 from the
/// provider (or a transport error) comes back as `delivered == false` with
/// the detail preserved. Callers must not assume delivery succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct SendReceipt {
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendReceipt {
    pub fn delivered(response: serde_json::Value) -> Self {
        Self {
            delivered: true,
            response: Some(response),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            delivered: false,
            response: None,
            error: Some(error.into()),
        }
    }
}

/// Accepts RFC 3339 (what the store boundary emits) and naive ISO strings
/// written by older records.
fn deserialize_instant<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn asha() -> Patient {
        serde_json::from_value(json!({
            "patientid": 101,
            "name": "Asha",
            "mobileno": "9990001111",
            "email": "asha@example.com",
            "type": "Diet",
            "time": "2026-08-01T09:30:00Z",
            "DIET_PLAN": {"DAY1": "Oats breakfast", "DAY2": "Salad lunch"},
            "weight": 62,
            "bp": "120/80"
        }))
        .unwrap()
    }

    #[test]
    fn test_plan_lookup_uppercases_type() {
        let patient = asha();
        assert_eq!(patient.plan_for("Diet", "DAY1"), Some("Oats breakfast"));
        assert_eq!(patient.plan_for("diet", "DAY2"), Some("Salad lunch"));
        assert_eq!(patient.plan_for("Diet", "DAY3"), None);
        assert_eq!(patient.plan_for("Exercise", "DAY1"), None);
    }

    #[test]
    fn test_display_fields() {
        let patient = asha();
        assert_eq!(patient.display_field("weight"), "62");
        assert_eq!(patient.display_field("bp"), "120/80");
        assert_eq!(patient.display_field("fasting_sugar"), "N/A");
        assert_eq!(patient.display_name(), "Asha");
    }

    #[test]
    fn test_time_serializes_as_iso_string() {
        let patient = asha();
        let value = serde_json::to_value(&patient).unwrap();
        let time = value["time"].as_str().expect("time must be a string");
        assert!(time.starts_with("2026-08-01T09:30:00"));
        assert!(value.get("_id").is_none());
    }

    #[test]
    fn test_naive_timestamp_accepted() {
        let patient: Patient = serde_json::from_value(json!({
            "patientid": 7,
            "name": "Ravi",
            "time": "2025-12-31T23:59:59.123456"
        }))
        .unwrap();
        assert!(patient.time.is_some());
    }

    #[test]
    fn test_missing_optionals_default() {
        let patient: Patient = serde_json::from_value(json!({"patientid": 1})).unwrap();
        assert!(patient.name.is_empty());
        assert_eq!(patient.display_name(), "Unknown");
        assert!(patient.mobileno.is_empty());
        assert!(patient.time.is_none());
        assert!(patient.meeting_details.is_none());
    }
}
