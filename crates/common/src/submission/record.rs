//! Typed view of a validated submission

use super::fields as names;
use super::normalizer::FormFields;
use super::validator::validate;
use crate::errors::Result;
use chrono::NaiveDate;
use serde::Serialize;

const CONTACT_DELIMITER: char = '/';
const TRUTHY: &[&str] = &["true", "on", "ja", "yes", "1"];

/// A validated Gutachten submission. Built once, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionRecord {
    pub order_number: String,
    pub client: ClientDetails,
    pub vehicle: VehicleDetails,
    pub incident: IncidentDetails,
    /// Base64 data URI of the drawn signature
    #[serde(skip_serializing)]
    pub signature: Option<String>,
    pub notes: Option<String>,
    pub cession: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientDetails {
    pub name: String,
    pub address: String,
    /// Contact string as typed, usually `email / phone`
    pub contact: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Vehicle plate; the business key for contacts and folders
    pub plate: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VehicleDetails {
    pub odometer: Option<String>,
    pub tires: Option<String>,
    pub vin: Option<String>,
}

impl VehicleDetails {
    pub fn has_any(&self) -> bool {
        self.odometer.is_some() || self.tires.is_some() || self.vin.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IncidentDetails {
    pub date: String,
    pub time: Option<String>,
    pub location: String,
    pub description: Option<String>,
}

impl IncidentDetails {
    /// ISO dates as `DD.MM.YYYY`, anything else verbatim
    pub fn date_display(&self) -> String {
        self.parsed_date()
            .map(|d| d.format("%d.%m.%Y").to_string())
            .unwrap_or_else(|| self.date.clone())
    }

    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").ok()
    }
}

/// Split a combined contact string on its first `/`.
///
/// Without a delimiter the whole string is taken as email when it contains
/// an `@`, otherwise as phone number.
pub fn split_contact(contact: &str) -> (Option<String>, Option<String>) {
    let non_blank = |s: &str| Some(s.trim().to_string()).filter(|s| !s.is_empty());
    match contact.split_once(CONTACT_DELIMITER) {
        Some((email, phone)) => (non_blank(email), non_blank(phone)),
        None if contact.contains('@') => (non_blank(contact), None),
        None => (None, non_blank(contact)),
    }
}

impl SubmissionRecord {
    /// Validate the canonical fields and build the typed record
    pub fn from_fields(fields: &FormFields) -> Result<Self> {
        validate(fields)?;

        let text = |name: &str| fields.get_present(name).unwrap_or_default().to_string();
        let optional = |name: &str| fields.get_present(name).map(str::to_string);

        let contact = text(names::CLIENT_CONTACT);
        let (email, phone) = split_contact(&contact);

        Ok(Self {
            order_number: text(names::ORDER_NUMBER),
            client: ClientDetails {
                name: text(names::CLIENT_NAME),
                address: text(names::CLIENT_ADDRESS),
                contact,
                email,
                phone,
                plate: text(names::CLIENT_PLATE),
            },
            vehicle: VehicleDetails {
                odometer: optional(names::VEHICLE_ODOMETER),
                tires: optional(names::VEHICLE_TIRES),
                vin: optional(names::VEHICLE_VIN),
            },
            incident: IncidentDetails {
                date: text(names::INCIDENT_DATE),
                time: optional(names::INCIDENT_TIME),
                location: text(names::INCIDENT_LOCATION),
                description: optional(names::INCIDENT_DESCRIPTION),
            },
            signature: optional(names::SIGNATURE),
            notes: optional(names::NOTES),
            cession: fields
                .get_present(names::CESSION)
                .map(|v| TRUTHY.iter().any(|t| v.eq_ignore_ascii_case(t)))
                .unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;

    fn fields(extra: &[(&str, &str)]) -> FormFields {
        let mut fields: FormFields = [
            (names::ORDER_NUMBER, "GA-2025-7"),
            (names::CLIENT_NAME, "Max Mustermann"),
            (names::CLIENT_ADDRESS, "Teststr 1"),
            (names::CLIENT_CONTACT, "max@test.de / 0151123456"),
            (names::CLIENT_PLATE, "BI-XX 123"),
            (names::INCIDENT_DATE, "2025-01-01"),
            (names::INCIDENT_LOCATION, "Bielefeld"),
        ]
        .into_iter()
        .collect();
        for (k, v) in extra {
            fields.insert(*k, *v);
        }
        fields
    }

    #[test]
    fn test_contact_is_split_on_first_slash() {
        let record = SubmissionRecord::from_fields(&fields(&[])).unwrap();
        assert_eq!(record.client.email.as_deref(), Some("max@test.de"));
        assert_eq!(record.client.phone.as_deref(), Some("0151123456"));
    }

    #[test]
    fn test_split_contact_edge_cases() {
        assert_eq!(split_contact("a@b.de"), (Some("a@b.de".into()), None));
        assert_eq!(split_contact("0521 123"), (None, Some("0521 123".into())));
        assert_eq!(
            split_contact("a@b.de / 01 / 02"),
            (Some("a@b.de".into()), Some("01 / 02".into()))
        );
        assert_eq!(split_contact(" / 0151"), (None, Some("0151".into())));
    }

    #[test]
    fn test_vehicle_section_presence() {
        let record = SubmissionRecord::from_fields(&fields(&[])).unwrap();
        assert!(!record.vehicle.has_any());

        let record = SubmissionRecord::from_fields(&fields(&[(names::VEHICLE_VIN, "WVW123")])).unwrap();
        assert!(record.vehicle.has_any());
    }

    #[test]
    fn test_cession_flag_values() {
        for value in ["true", "on", "Ja", "1"] {
            let record = SubmissionRecord::from_fields(&fields(&[(names::CESSION, value)])).unwrap();
            assert!(record.cession, "{value} should enable cession");
        }
        let record = SubmissionRecord::from_fields(&fields(&[(names::CESSION, "false")])).unwrap();
        assert!(!record.cession);
    }

    #[test]
    fn test_date_display() {
        let record = SubmissionRecord::from_fields(&fields(&[])).unwrap();
        assert_eq!(record.incident.date_display(), "01.01.2025");

        let record = SubmissionRecord::from_fields(&fields(&[(names::INCIDENT_DATE, "gestern")])).unwrap();
        assert_eq!(record.incident.date_display(), "gestern");
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let mut f = fields(&[]);
        f.remove(names::CLIENT_PLATE);
        let err = SubmissionRecord::from_fields(&f).unwrap_err();
        assert!(matches!(err, AppError::MissingField { field } if field == names::CLIENT_PLATE));
    }
}
