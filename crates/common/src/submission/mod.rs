//! Submission intake: raw payload to validated record

pub mod fields;
pub mod normalizer;
pub mod record;
pub mod validator;

pub use normalizer::{normalize, FormFields, FormPayload};
pub use record::{ClientDetails, IncidentDetails, SubmissionRecord, VehicleDetails};
pub use validator::validate;
