//! Field normalization
//!
//! Clients post the same form in different shapes: flat underscore keys,
//! dotted paths (`auftraggeber.name`), camelCase aliases, or nested objects.
//! Everything is folded into one flat [`FormFields`] map before validation.

use super::fields::{ALIASES, ORDER_NUMBER};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

const PATH_DELIMITER: char = '.';
const CANONICAL_DELIMITER: &str = "_";

/// Raw form body as received at the HTTP boundary
#[derive(Debug, Clone, PartialEq)]
pub enum FormPayload {
    /// Scalar values only; keys are underscore names or dotted paths
    Flat(Map<String, Value>),
    /// At least one value is an object that has to be flattened first
    Nested(Map<String, Value>),
}

impl From<Map<String, Value>> for FormPayload {
    fn from(map: Map<String, Value>) -> Self {
        if map.values().any(Value::is_object) {
            FormPayload::Nested(map)
        } else {
            FormPayload::Flat(map)
        }
    }
}

impl<'de> Deserialize<'de> for FormPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::<String, Value>::deserialize(deserializer).map(FormPayload::from)
    }
}

impl FormPayload {
    /// Flatten into `(key, value)` pairs with dotted keys for nested objects.
    /// Scalars are stringified, `null` is dropped and arrays are joined.
    pub fn into_pairs(self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        match self {
            FormPayload::Flat(map) => {
                for (key, value) in map {
                    if let Some(text) = scalar_to_string(&value) {
                        pairs.push((key, text));
                    }
                }
            }
            FormPayload::Nested(map) => flatten_into(None, map, &mut pairs),
        }
        pairs
    }
}

fn flatten_into(prefix: Option<&str>, map: Map<String, Value>, out: &mut Vec<(String, String)>) {
    for (key, value) in map {
        let path = match prefix {
            Some(prefix) => format!("{prefix}{PATH_DELIMITER}{key}"),
            None => key,
        };
        match value {
            Value::Object(inner) => flatten_into(Some(&path), inner, out),
            other => {
                if let Some(text) = scalar_to_string(&other) {
                    out.push((path, text));
                }
            }
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(scalar_to_string)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}

/// Canonical flat field map produced by [`normalize`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormFields(BTreeMap<String, String>);

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Value with surrounding whitespace removed; blank values count as absent
    pub fn get_present(&self, name: &str) -> Option<&str> {
        self.get(name).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Map a client key onto its canonical name
pub fn canonical_key(key: &str) -> String {
    if let Some((_, canonical)) = ALIASES.iter().find(|(alias, _)| *alias == key) {
        return (*canonical).to_string();
    }
    if !key.contains(PATH_DELIMITER) {
        return key.to_string();
    }
    match key.split_once(PATH_DELIMITER) {
        Some((head, tail)) if !tail.contains(PATH_DELIMITER) => {
            format!("{head}{CANONICAL_DELIMITER}{tail}")
        }
        _ => key.replace(PATH_DELIMITER, CANONICAL_DELIMITER),
    }
}

/// Normalize a raw payload, synthesizing an order number when none was sent
pub fn normalize(payload: FormPayload) -> FormFields {
    normalize_pairs(payload.into_pairs(), Utc::now())
}

/// Normalize already-flattened pairs.
///
/// Keys that are canonical as sent take precedence over keys that only become
/// canonical through rewriting, so `a_b` wins over `a.b` when both appear.
pub fn normalize_pairs<I>(pairs: I, now: DateTime<Utc>) -> FormFields
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut fields = FormFields::new();
    let mut rewritten = Vec::new();

    for (key, value) in pairs {
        let canonical = canonical_key(&key);
        if canonical == key {
            fields.insert(canonical, value);
        } else {
            rewritten.push((canonical, value));
        }
    }

    for (key, value) in rewritten {
        if !fields.contains(&key) {
            fields.insert(key, value);
        }
    }

    if fields.get_present(ORDER_NUMBER).is_none() {
        let order_number = synthesize_order_number(now);
        tracing::debug!(order_number = %order_number, "No order number submitted, generated one");
        fields.insert(ORDER_NUMBER, order_number);
    }

    fields
}

static LAST_ISSUED_MS: AtomicI64 = AtomicI64::new(0);

/// Build `GA-{year}-{millis since start of year}`.
///
/// The millisecond value is strictly increasing within the process, so two
/// calls never return the same number even inside the same millisecond.
pub fn synthesize_order_number(now: DateTime<Utc>) -> String {
    let now_ms = now.timestamp_millis();
    let previous = LAST_ISSUED_MS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now_ms.max(last + 1))
        })
        .unwrap_or(now_ms);
    let issued_ms = now_ms.max(previous + 1);

    let issued = Utc
        .timestamp_millis_opt(issued_ms)
        .single()
        .unwrap_or(now);
    let year = issued.year();
    let year_start = Utc
        .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .map(|t| t.timestamp_millis())
        .unwrap_or(0);

    format!("GA-{}-{}", year, issued_ms - year_start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::fields as names;
    use serde_json::json;

    fn payload(value: Value) -> FormPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_dotted_key_becomes_underscore() {
        let fields = normalize(payload(json!({
            "auftraggeber.name": "Max Mustermann",
            "unfall_ort": "Bielefeld",
        })));

        assert_eq!(fields.get("auftraggeber_name"), Some("Max Mustermann"));
        assert_eq!(fields.get("unfall_ort"), Some("Bielefeld"));
        assert!(!fields.contains("auftraggeber.name"));
    }

    #[test]
    fn test_multi_segment_key_replaces_every_delimiter() {
        assert_eq!(canonical_key("a.b.c"), "a_b_c");
        assert_eq!(canonical_key("a.b"), "a_b");
        assert_eq!(canonical_key("plain"), "plain");
    }

    #[test]
    fn test_aliases_are_rewritten() {
        let fields = normalize(payload(json!({
            "auftragsNummer": "GA-2025-1",
            "unfallTag": "2025-01-01",
        })));

        assert_eq!(fields.get(names::ORDER_NUMBER), Some("GA-2025-1"));
        assert_eq!(fields.get(names::INCIDENT_DATE), Some("2025-01-01"));
        assert!(!fields.contains("auftragsNummer"));
    }

    #[test]
    fn test_nested_objects_are_flattened() {
        let raw = payload(json!({
            "auftraggeber": { "name": "Erika", "kennzeichen": "BI-AB 1" },
            "abtretung": true,
            "fahrzeug_km": 120000,
            "notizen": null,
        }));
        assert!(matches!(raw, FormPayload::Nested(_)));

        let fields = normalize(raw);
        assert_eq!(fields.get("auftraggeber_name"), Some("Erika"));
        assert_eq!(fields.get("auftraggeber_kennzeichen"), Some("BI-AB 1"));
        assert_eq!(fields.get("abtretung"), Some("true"));
        assert_eq!(fields.get("fahrzeug_km"), Some("120000"));
        assert!(!fields.contains("notizen"));
    }

    #[test]
    fn test_canonical_key_wins_over_rewritten_key() {
        let fields = normalize_pairs(
            vec![
                ("a.b".to_string(), "dotted".to_string()),
                ("a_b".to_string(), "flat".to_string()),
            ],
            Utc::now(),
        );
        assert_eq!(fields.get("a_b"), Some("flat"));
    }

    #[test]
    fn test_missing_order_number_is_synthesized() {
        let fields = normalize(payload(json!({ "auftraggeber_name": "Max" })));
        let order = fields.get(names::ORDER_NUMBER).unwrap();
        assert!(order.starts_with("GA-"));
    }

    #[test]
    fn test_blank_order_number_is_replaced() {
        let fields = normalize(payload(json!({ "auftragsnummer": "   " })));
        assert!(fields.get_present(names::ORDER_NUMBER).is_some());
    }

    #[test]
    fn test_synthesized_numbers_are_unique() {
        let now = Utc::now();
        let a = synthesize_order_number(now);
        let b = synthesize_order_number(now);
        assert_ne!(a, b);
    }
}
