//! Canonical field names of a Gutachten submission

pub const ORDER_NUMBER: &str = "auftragsnummer";
pub const CLIENT_NAME: &str = "auftraggeber_name";
pub const CLIENT_ADDRESS: &str = "auftraggeber_adresse";
pub const CLIENT_CONTACT: &str = "auftraggeber_kontakt";
pub const CLIENT_PLATE: &str = "auftraggeber_kennzeichen";
pub const INCIDENT_DATE: &str = "unfall_tag";
pub const INCIDENT_TIME: &str = "unfall_zeit";
pub const INCIDENT_LOCATION: &str = "unfall_ort";
pub const INCIDENT_DESCRIPTION: &str = "unfall_hergang";
pub const VEHICLE_ODOMETER: &str = "fahrzeug_km";
pub const VEHICLE_TIRES: &str = "fahrzeug_reifen";
pub const VEHICLE_VIN: &str = "fahrzeug_fin";
pub const SIGNATURE: &str = "unterschrift";
pub const NOTES: &str = "notizen";
pub const CESSION: &str = "abtretung";

/// Fields that must be present and non-blank, checked in this order
pub const REQUIRED: &[&str] = &[
    ORDER_NUMBER,
    CLIENT_NAME,
    CLIENT_ADDRESS,
    CLIENT_CONTACT,
    CLIENT_PLATE,
    INCIDENT_DATE,
    INCIDENT_LOCATION,
];

/// Client-side spellings rewritten to their canonical name
pub const ALIASES: &[(&str, &str)] = &[
    ("auftragsNummer", ORDER_NUMBER),
    ("orderNumber", ORDER_NUMBER),
    ("unfallTag", INCIDENT_DATE),
    ("unfallOrt", INCIDENT_LOCATION),
    ("unfallZeit", INCIDENT_TIME),
];
