use serde_json::Value;
use thiserror::Error;

use crate::stats::{ErrorBucket, StatsSnapshot, ValidationStats};

// ===== Schema declaration =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Object,
}

impl FieldKind {
    fn name(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Object => "object",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            // JSON cannot tell 35 from 35.0, so integers pass a float check.
            FieldKind::Float => value.is_number(),
            FieldKind::Object => value.is_object(),
        }
    }
}

/// One required field of the wire contract: expected kind, plus an
/// optional closed numeric interval and an optional closed literal set.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub range: Option<(f64, f64)>,
    pub allowed: Option<&'static [&'static str]>,
}

pub const SIGNAL_STATES: &[&str] = &["red", "yellow", "green"];
pub const DISTRICTS: &[&str] = &["downtown", "residential", "industrial", "suburban"];

/// Required fields of one traffic reading, in report order.
pub const TRAFFIC_SCHEMA: &[FieldSpec] = &[
    FieldSpec { name: "sensor_id", kind: FieldKind::String, range: None, allowed: None },
    FieldSpec { name: "intersection_id", kind: FieldKind::String, range: None, allowed: None },
    FieldSpec { name: "timestamp", kind: FieldKind::String, range: None, allowed: None },
    FieldSpec { name: "vehicle_count", kind: FieldKind::Integer, range: Some((0.0, 1000.0)), allowed: None },
    FieldSpec { name: "average_speed", kind: FieldKind::Float, range: Some((0.0, 100.0)), allowed: None },
    FieldSpec { name: "occupancy_rate", kind: FieldKind::Float, range: Some((0.0, 1.0)), allowed: None },
    FieldSpec { name: "vehicle_types", kind: FieldKind::Object, range: None, allowed: None },
    FieldSpec { name: "wait_time_seconds", kind: FieldKind::Float, range: Some((0.0, 600.0)), allowed: None },
    FieldSpec { name: "queue_length", kind: FieldKind::Integer, range: Some((0.0, 500.0)), allowed: None },
    FieldSpec { name: "signal_state", kind: FieldKind::String, range: None, allowed: Some(SIGNAL_STATES) },
    FieldSpec { name: "latitude", kind: FieldKind::Float, range: Some((-90.0, 90.0)), allowed: None },
    FieldSpec { name: "longitude", kind: FieldKind::Float, range: Some((-180.0, 180.0)), allowed: None },
    FieldSpec { name: "district", kind: FieldKind::String, range: None, allowed: Some(DISTRICTS) },
];

// ===== Error descriptors =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    MissingField,
    NullField,
    TypeMismatch,
    OutOfRange,
    InvalidEnum,
    Unparseable,
}

impl ErrorCategory {
    pub(crate) fn bucket(self) -> ErrorBucket {
        match self {
            ErrorCategory::MissingField | ErrorCategory::TypeMismatch | ErrorCategory::Unparseable => {
                ErrorBucket::Schema
            }
            ErrorCategory::NullField => ErrorBucket::Null,
            ErrorCategory::OutOfRange | ErrorCategory::InvalidEnum => ErrorBucket::Value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {detail}")]
pub struct ValidationError {
    pub field: &'static str,
    pub category: ErrorCategory,
    pub detail: String,
}

impl ValidationError {
    fn new(field: &'static str, category: ErrorCategory, detail: String) -> Self {
        Self { field, category, detail }
    }
}

// ===== Validator =====

/// Streaming validator for serialized traffic readings. Validation never
/// fails the stream; every outcome is committed to the running stats.
pub struct TrafficValidator {
    stats: ValidationStats,
}

impl TrafficValidator {
    pub fn new() -> Self {
        Self {
            stats: ValidationStats::new(),
        }
    }

    pub fn stats(&self) -> &ValidationStats {
        &self.stats
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Validate one serialized message and commit its statistics.
    pub fn validate(&mut self, payload: &str) -> (bool, Vec<ValidationError>) {
        let errors = Self::check(payload);
        if errors.is_empty() {
            self.stats.record_valid(payload);
            return (true, errors);
        }

        let buckets: Vec<ErrorBucket> = errors.iter().map(|e| e.category.bucket()).collect();
        let summary = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        self.stats
            .record_invalid(&format!("{summary} | payload: {payload}"), &buckets);
        (false, errors)
    }

    /// Pure three-phase check with no statistics side effects. Each phase
    /// examines all of its fields so the report is complete.
    pub fn check(payload: &str) -> Vec<ValidationError> {
        let message: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(err) => {
                return vec![ValidationError::new(
                    "payload",
                    ErrorCategory::Unparseable,
                    format!("not valid JSON: {err}"),
                )];
            }
        };
        let Some(message) = message.as_object() else {
            return vec![ValidationError::new(
                "payload",
                ErrorCategory::Unparseable,
                "not a JSON object".to_string(),
            )];
        };

        let mut errors = Vec::new();

        // Phase 1: schema (presence, nullness, kind).
        for spec in TRAFFIC_SCHEMA {
            match message.get(spec.name) {
                None => errors.push(ValidationError::new(
                    spec.name,
                    ErrorCategory::MissingField,
                    "missing required field".to_string(),
                )),
                Some(Value::Null) => errors.push(ValidationError::new(
                    spec.name,
                    ErrorCategory::NullField,
                    "null value".to_string(),
                )),
                Some(value) if !spec.kind.matches(value) => errors.push(ValidationError::new(
                    spec.name,
                    ErrorCategory::TypeMismatch,
                    format!("expected {}, got {}", spec.kind.name(), json_kind(value)),
                )),
                Some(_) => {}
            }
        }

        // Phase 2: declared numeric bounds, checked for any present number.
        for spec in TRAFFIC_SCHEMA {
            let Some((lo, hi)) = spec.range else { continue };
            let Some(number) = message.get(spec.name).and_then(Value::as_f64) else {
                continue;
            };
            if number < lo || number > hi {
                errors.push(ValidationError::new(
                    spec.name,
                    ErrorCategory::OutOfRange,
                    format!("{number} outside [{lo}, {hi}]"),
                ));
            }
        }

        // Phase 3: declared closed literal sets.
        for spec in TRAFFIC_SCHEMA {
            let Some(allowed) = spec.allowed else { continue };
            let Some(text) = message.get(spec.name).and_then(Value::as_str) else {
                continue;
            };
            if !allowed.contains(&text) {
                errors.push(ValidationError::new(
                    spec.name,
                    ErrorCategory::InvalidEnum,
                    format!("{text:?} not one of {allowed:?}"),
                ));
            }
        }

        errors
    }
}

impl Default for TrafficValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CityGrid;
    use crate::traffic::TrafficSynthesizer;
    use chrono::Utc;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn valid_payload() -> String {
        let mut rng = StdRng::seed_from_u64(17);
        let grid = CityGrid::build((40.7128, -74.0060), 2, &mut rng).unwrap();
        let mut synthesizer = TrafficSynthesizer::new(StdRng::seed_from_u64(18));
        let reading = synthesizer.synthesize(&grid.intersections()[0], Utc::now(), 1.2);
        serde_json::to_string(&reading).unwrap()
    }

    fn tampered(edit: impl FnOnce(&mut serde_json::Map<String, Value>)) -> String {
        let mut message: Value = serde_json::from_str(&valid_payload()).unwrap();
        edit(message.as_object_mut().unwrap());
        message.to_string()
    }

    #[test]
    fn synthesized_reading_is_valid() {
        let mut validator = TrafficValidator::new();
        let (valid, errors) = validator.validate(&valid_payload());
        assert!(valid, "unexpected errors: {errors:?}");
        assert_eq!(validator.stats().valid_messages(), 1);
        assert_eq!(validator.stats().invalid_messages(), 0);
    }

    #[test]
    fn missing_sensor_id_is_a_schema_error() {
        let mut validator = TrafficValidator::new();
        let payload = tampered(|message| {
            message.remove("sensor_id");
        });
        let (valid, errors) = validator.validate(&payload);
        assert!(!valid);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].category, ErrorCategory::MissingField);
        assert_eq!(validator.stats().schema_errors(), 1);
        assert_eq!(validator.stats().invalid_messages(), 1);
    }

    #[test]
    fn null_district_is_a_null_error() {
        let mut validator = TrafficValidator::new();
        let payload = tampered(|message| {
            message.insert("district".to_string(), Value::Null);
        });
        let (valid, errors) = validator.validate(&payload);
        assert!(!valid);
        assert_eq!(errors[0].category, ErrorCategory::NullField);
        assert_eq!(validator.stats().null_errors(), 1);
        assert_eq!(validator.stats().schema_errors(), 0);
    }

    #[test]
    fn out_of_range_occupancy_is_a_value_error() {
        let mut validator = TrafficValidator::new();
        let payload = tampered(|message| {
            message.insert("occupancy_rate".to_string(), serde_json::json!(1.5));
        });
        let (valid, errors) = validator.validate(&payload);
        assert!(!valid);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].category, ErrorCategory::OutOfRange);
        assert_eq!(validator.stats().value_errors(), 1);
    }

    #[test]
    fn unknown_signal_state_is_a_value_error() {
        let mut validator = TrafficValidator::new();
        let payload = tampered(|message| {
            message.insert("signal_state".to_string(), serde_json::json!("blue"));
        });
        let (valid, errors) = validator.validate(&payload);
        assert!(!valid);
        assert_eq!(errors[0].category, ErrorCategory::InvalidEnum);
        assert_eq!(validator.stats().value_errors(), 1);
    }

    #[test]
    fn wrong_type_is_reported_per_field() {
        let errors = TrafficValidator::check(&tampered(|message| {
            message.insert("vehicle_count".to_string(), serde_json::json!("forty"));
            message.insert("latitude".to_string(), serde_json::json!(true));
        }));
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.category == ErrorCategory::TypeMismatch));
    }

    #[test]
    fn integer_passes_where_float_is_declared() {
        let errors = TrafficValidator::check(&tampered(|message| {
            message.insert("average_speed".to_string(), serde_json::json!(35));
        }));
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }

    #[test]
    fn counters_accumulate_per_violation_not_per_message() {
        let mut validator = TrafficValidator::new();
        let payload = tampered(|message| {
            message.insert("occupancy_rate".to_string(), serde_json::json!(2.0));
            message.insert("average_speed".to_string(), serde_json::json!(-3.0));
            message.insert("queue_length".to_string(), serde_json::json!(9999));
        });
        let (valid, errors) = validator.validate(&payload);
        assert!(!valid);
        assert_eq!(errors.len(), 3);
        assert_eq!(validator.stats().value_errors(), 3);
        assert_eq!(validator.stats().invalid_messages(), 1);
        assert_eq!(validator.stats().total_messages(), 1);
    }

    #[test]
    fn unparseable_payload_is_one_schema_error() {
        let mut validator = TrafficValidator::new();
        let (valid, errors) = validator.validate("not json at all");
        assert!(!valid);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].category, ErrorCategory::Unparseable);
        assert_eq!(validator.stats().schema_errors(), 1);
    }

    #[test]
    fn report_order_follows_the_schema() {
        let errors = TrafficValidator::check(&tampered(|message| {
            message.remove("sensor_id");
            message.remove("district");
        }));
        assert_eq!(errors[0].field, "sensor_id");
        assert_eq!(errors[1].field, "district");
    }

    #[test]
    fn all_phases_run_even_when_schema_fails() {
        // One field can contribute a schema error while another still gets
        // its range checked.
        let errors = TrafficValidator::check(&tampered(|message| {
            message.remove("sensor_id");
            message.insert("wait_time_seconds".to_string(), serde_json::json!(1e4));
        }));
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].category, ErrorCategory::MissingField);
        assert_eq!(errors[1].category, ErrorCategory::OutOfRange);
    }
}
