//! # Careloop Store
//!
//! Read/update access to patient documents keyed by `patientid`. BSON
//! stays inside this crate: documents are sanitized at the boundary so
//! datetimes leave as ISO-8601 strings and the store identity field never
//! leaks.

pub mod patients;

pub use patients::PatientStore;
