//! Patient collection access.

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, Bson, Document, doc};
use mongodb::{Client, Collection};

use careloop_core::config::StoreConfig;
use careloop_core::error::{CareloopError, Result};
use careloop_core::types::{MeetingDetails, Patient};

/// Handle to the patient collection.
#[derive(Clone)]
pub struct PatientStore {
    collection: Collection<Document>,
}

impl PatientStore {
    /// Connect to the configured database and collection. The underlying
    /// client connects lazily; a bad connection string fails here, an
    /// unreachable server fails at the first operation.
    pub async fn new(config: &StoreConfig) -> Result<Self> {
        let client = Client::with_uri_str(&config.connection_string)
            .await
            .map_err(|e| CareloopError::Store(format!("connect: {e}")))?;
        let collection = client
            .database(&config.database)
            .collection::<Document>(&config.collection);
        tracing::info!(
            "Patient store ready (db={}, collection={})",
            config.database,
            config.collection
        );
        Ok(Self { collection })
    }

    /// Fetch one patient by id, `None` when absent.
    pub async fn find_by_id(&self, patientid: i64) -> Result<Option<Patient>> {
        let found = self
            .collection
            .find_one(doc! { "patientid": patientid })
            .projection(doc! { "_id": 0 })
            .await
            .map_err(|e| CareloopError::Store(format!("find_one: {e}")))?;
        found.map(to_patient).transpose()
    }

    /// Fetch every patient record.
    pub async fn find_all(&self) -> Result<Vec<Patient>> {
        let mut cursor = self
            .collection
            .find(doc! {})
            .projection(doc! { "_id": 0 })
            .await
            .map_err(|e| CareloopError::Store(format!("find: {e}")))?;
        let mut patients = Vec::new();
        while let Some(document) = cursor
            .try_next()
            .await
            .map_err(|e| CareloopError::Store(format!("cursor: {e}")))?
        {
            patients.push(to_patient(document)?);
        }
        Ok(patients)
    }

    /// `$set` the given fields on one patient; returns the matched count.
    pub async fn update_fields(&self, patientid: i64, fields: Document) -> Result<u64> {
        let result = self
            .collection
            .update_one(doc! { "patientid": patientid }, doc! { "$set": fields })
            .await
            .map_err(|e| CareloopError::Store(format!("update_one: {e}")))?;
        Ok(result.matched_count)
    }

    /// Mark a plan active: sets `type` and stamps `time` with a native
    /// store datetime.
    pub async fn activate_plan(
        &self,
        patientid: i64,
        plan_type: &str,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        self.update_fields(patientid, activation_fields(plan_type, now))
            .await
    }

    /// Persist meeting metadata onto the patient record.
    pub async fn save_meeting_details(
        &self,
        patientid: i64,
        details: &MeetingDetails,
    ) -> Result<u64> {
        self.update_fields(patientid, meeting_fields(details)?).await
    }
}

fn to_patient(document: Document) -> Result<Patient> {
    bson::from_document(sanitize(document))
        .map_err(|e| CareloopError::Store(format!("decode patient: {e}")))
}

fn activation_fields(plan_type: &str, now: DateTime<Utc>) -> Document {
    doc! {
        "type": plan_type,
        "time": Bson::DateTime(bson::DateTime::from_millis(now.timestamp_millis())),
    }
}

fn meeting_fields(details: &MeetingDetails) -> Result<Document> {
    let document = bson::to_document(details)
        .map_err(|e| CareloopError::Store(format!("encode meeting details: {e}")))?;
    Ok(doc! { "meeting_details": document })
}

/// Strip the identity field and convert store-native datetimes to ISO-8601
/// strings. Nothing past this function carries a raw BSON timestamp.
fn sanitize(mut document: Document) -> Document {
    document.remove("_id");
    if let Some(Bson::DateTime(dt)) = document.get("time").cloned() {
        if let Ok(iso) = dt.try_to_rfc3339_string() {
            document.insert("time", iso);
        }
    }
    if let Some(Bson::Document(mut meeting)) = document.get("meeting_details").cloned() {
        if let Some(Bson::DateTime(dt)) = meeting.get("scheduled_at").cloned() {
            if let Ok(iso) = dt.try_to_rfc3339_string() {
                meeting.insert("scheduled_at", iso);
            }
        }
        document.insert("meeting_details", meeting);
    }
    document
}
