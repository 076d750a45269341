//! API route handlers.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{Duration, Local, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use careloop_core::types::{MeetingDetails, Patient};

use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct PatientQuery {
    pub patientid: i64,
}

#[derive(Debug, Deserialize)]
pub struct PlanQuery {
    pub patientid: i64,
    #[serde(rename = "type")]
    pub plan_type: String,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub patientid: i64,
    // Accepted for interface compatibility; the summary always uses the
    // HealthSummary template.
    #[serde(rename = "type")]
    pub _plan_type: String,
}

#[derive(Debug, Deserialize)]
pub struct SummaryTemplateQuery {
    pub mobile_number: String,
}

#[derive(Debug, Deserialize)]
pub struct MeetingQuery {
    pub patientid: i64,
    pub meeting_datetime: String,
}

/// GET /api/health_check
pub async fn health_check() -> Json<Value> {
    Json(json!("OK"))
}

/// GET /api/fetch_all_records
pub async fn fetch_all_records(
    State(state): State<AppState>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    let records = state.store.find_all().await?;
    if records.is_empty() {
        return Err(ApiError::NotFound("No records found".into()));
    }
    Ok(Json(records))
}

/// GET /api/fetch_patient_details
pub async fn fetch_patient_details(
    State(state): State<AppState>,
    Query(q): Query<PatientQuery>,
) -> Result<Json<Patient>, ApiError> {
    let patient = state
        .store
        .find_by_id(q.patientid)
        .await?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;
    Ok(Json(patient))
}

/// POST /api/send_plan_via_whatsapp
///
/// Activates a plan: stamps `type`/`time`, sends the greeting right away,
/// and registers the 7 deferred deliveries. Responds as soon as the
/// deliveries are registered; delivery itself is decoupled from this
/// request.
pub async fn send_plan_via_whatsapp(
    State(state): State<AppState>,
    Query(q): Query<PlanQuery>,
) -> Result<Json<Value>, ApiError> {
    let now = Utc::now();
    let matched = state.store.activate_plan(q.patientid, &q.plan_type, now).await?;
    if matched == 0 {
        return Err(ApiError::NotFound("Patient Not Updated".into()));
    }

    let patient = state
        .store
        .find_by_id(q.patientid)
        .await?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;

    match state.templates.resolve("Greetings") {
        Some(template) => {
            let receipt = state
                .whatsapp
                .send_greeting(template, &patient.mobileno, &patient.name)
                .await;
            if !receipt.delivered {
                tracing::warn!("Greeting for patient {} was not delivered", q.patientid);
            }
        }
        None => tracing::warn!("No template mapped for Greetings"),
    }

    state
        .scheduler
        .lock()
        .await
        .schedule_plan(patient, &q.plan_type, now);

    Ok(Json(json!({ "message": "Plans for all 7 days will be sent daily!" })))
}

/// POST /api/send_patient_summary
pub async fn send_patient_summary(
    State(state): State<AppState>,
    Query(q): Query<SummaryQuery>,
) -> Result<Json<Value>, ApiError> {
    let patient = state
        .store
        .find_by_id(q.patientid)
        .await?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;

    if patient.mobileno.is_empty() {
        return Err(ApiError::Validation("Mobile number missing for patient".into()));
    }

    let name = patient.display_name().to_string();
    let weight = patient.display_field("weight");
    let bp = patient.display_field("bp");
    let heartrate = patient.display_field("heartrate");
    let sugar = patient.display_field("fasting_sugar");

    let template_name = state
        .templates
        .resolve("HealthSummary")
        .ok_or_else(|| ApiError::Internal("No template mapped for HealthSummary".into()))?;

    // Positional order must match the template placeholders {{1}}..{{5}}.
    let params = [
        name.clone(),
        weight.clone(),
        bp.clone(),
        heartrate.clone(),
        sugar.clone(),
    ];
    let receipt = state
        .whatsapp
        .send_template(template_name, &patient.mobileno, &params)
        .await;

    let sent_text = format!(
        "Health Summary:\n\nName: {name}\nWeight: {weight}\nBlood Pressure: {bp}\n\
         Heart Rate: {heartrate}\nFasting Sugar: {sugar}\n"
    );

    Ok(Json(json!({
        "message": format!("Health summary sent to {name} on WhatsApp"),
        "patientid": q.patientid,
        "whatsapp_response": receipt.response.unwrap_or(Value::Null),
        "sent_text": sent_text,
    })))
}

/// POST /api/send_summary_template
///
/// Sends the static summary template (no parameters) to any mobile number.
pub async fn send_summary_template(
    State(state): State<AppState>,
    Query(q): Query<SummaryTemplateQuery>,
) -> Result<Json<Value>, ApiError> {
    if q.mobile_number.len() < 10 {
        return Err(ApiError::Validation("Invalid mobile number".into()));
    }
    let cleaned = clean_mobile(&q.mobile_number);

    let template_name = state
        .templates
        .resolve("HealthSummary")
        .ok_or_else(|| ApiError::Internal("No template mapped for HealthSummary".into()))?;

    let receipt = state.whatsapp.send_template(template_name, &cleaned, &[]).await;

    Ok(Json(json!({
        "message": format!("Summary template sent successfully to {}", q.mobile_number),
        "mobile_number": cleaned,
        "template_name": template_name,
        "whatsapp_response": receipt.response.unwrap_or(Value::Null),
        "status": "success",
    })))
}

/// POST /api/schedule_meeting
///
/// Creates the calendar event, emails the patient, and persists the
/// meeting metadata. Email failure is recorded, not fatal.
pub async fn schedule_meeting(
    State(state): State<AppState>,
    Query(q): Query<MeetingQuery>,
) -> Result<Json<Value>, ApiError> {
    let patient = state
        .store
        .find_by_id(q.patientid)
        .await?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;

    let email = patient
        .email
        .clone()
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::Validation("Patient email not found in database".into()))?;

    let meeting_dt = parse_meeting_datetime(&q.meeting_datetime).ok_or_else(|| {
        ApiError::Validation("Invalid datetime format. Use: YYYY-MM-DDTHH:MM:SS".into())
    })?;
    if meeting_dt <= Local::now().naive_local() {
        return Err(ApiError::Validation("Meeting datetime must be in the future".into()));
    }

    let start = meeting_dt.format("%Y-%m-%dT%H:%M:%S").to_string();
    let end = (meeting_dt + Duration::hours(1))
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string();

    let meet_link = state
        .calendar
        .create_meet_event(
            &format!("Consultation with {}", patient.name),
            "Health Consultation via Google Meet",
            &start,
            &end,
        )
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to schedule meeting: {e}")))?;

    let email_sent = match state
        .mailer
        .send_meeting_notice(&patient.name, &email, meeting_dt, &meet_link)
        .await
    {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Failed to send meeting email: {e}");
            false
        }
    };

    let details = MeetingDetails {
        meeting_link: meet_link.clone(),
        meeting_datetime: q.meeting_datetime.clone(),
        scheduled_at: Local::now()
            .naive_local()
            .format("%Y-%m-%dT%H:%M:%S%.6f")
            .to_string(),
        email_sent,
    };
    state
        .store
        .save_meeting_details(q.patientid, &details)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to schedule meeting: {e}")))?;

    Ok(Json(json!({
        "message": format!("Meeting scheduled successfully for {}", patient.name),
        "patient_name": patient.name,
        "patient_email": email,
        "meeting_link": meet_link,
        "meeting_datetime": q.meeting_datetime,
        "email_sent": email_sent,
        "status": "success",
    })))
}

/// GET /api/test_email
pub async fn test_email(State(state): State<AppState>) -> Response {
    match state.mailer.send_self_test().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "message": "Email test successful!",
                "from_email": state.mailer.from_address(),
                "smtp_server": state.mailer.smtp_host(),
                "status": "working",
            })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "message": "Email test failed",
                "error": e.to_string(),
                "status": "failed",
            })),
        )
            .into_response(),
    }
}

/// Accepts `YYYY-MM-DDTHH:MM:SS` (seconds optional), naive local time.
fn parse_meeting_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()
}

fn clean_mobile(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}
