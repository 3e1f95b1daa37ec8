use super::EmployeeTimesheet;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Preferred container key for the employee list.
const PRIMARY_KEY: &str = "employees";

/// Alternate container keys, probed in order when `employees` is absent.
const FALLBACK_KEYS: [&str; 4] = ["results", "records", "data", "items"];

/// Any one of these makes a bare object count as a single record.
const RECORD_MARKERS: [&str; 5] = [
    "total_hours",
    "week_hours",
    "period",
    "employee_name",
    "client_name",
];

/// Key holding nested per-period entries that expand into separate records.
const PERIODS_KEY: &str = "weeks";

/// How a recovered value is laid out, decided before any record is built.
#[derive(Debug, PartialEq)]
pub enum RecoveredShape<'a> {
    /// Top-level array of employee objects.
    List(&'a [Value]),
    /// Object holding the employee array under `key`.
    Container { key: &'static str, records: &'a [Value] },
    /// Object that is itself one employee record.
    SingleRecord(&'a Map<String, Value>),
    Unrecognized,
}

impl<'a> RecoveredShape<'a> {
    pub fn classify(value: &'a Value) -> Self {
        match value {
            Value::Array(items) => Self::List(items),
            Value::Object(map) => {
                let container = std::iter::once(PRIMARY_KEY)
                    .chain(FALLBACK_KEYS)
                    .find_map(|key| match map.get(key) {
                        Some(Value::Array(records)) => Some(Self::Container { key, records }),
                        _ => None,
                    });

                match container {
                    Some(shape) => shape,
                    None if RECORD_MARKERS.iter().any(|k| map.contains_key(*k)) => {
                        Self::SingleRecord(map)
                    }
                    None => Self::Unrecognized,
                }
            }
            _ => Self::Unrecognized,
        }
    }
}

/// Maps recovered JSON onto `EmployeeTimesheet` records.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    tolerance: f64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self { tolerance: 0.1 }
    }
}

impl Normalizer {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Records in order of appearance. Unrecognised structure yields an empty
    /// list; entries that fail validation are skipped with a warning.
    pub fn normalize(&self, value: &Value) -> Vec<EmployeeTimesheet> {
        let entries: Vec<&Value> = match RecoveredShape::classify(value) {
            RecoveredShape::List(items) => {
                debug!(count = items.len(), "Top-level employee array");
                items.iter().collect()
            }
            RecoveredShape::Container { key, records } => {
                debug!(key, count = records.len(), "Employee container found");
                records.iter().collect()
            }
            RecoveredShape::SingleRecord(_) => {
                debug!("Object looks like a single employee record");
                vec![value]
            }
            RecoveredShape::Unrecognized => {
                warn!(kind = value_kind(value), "No employee list in recovered JSON");
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        for (idx, entry) in entries.into_iter().enumerate() {
            match entry.get(PERIODS_KEY) {
                Some(Value::Array(periods)) if !periods.is_empty() => {
                    self.expand_periods(idx, entry, periods, &mut records);
                }
                Some(Value::Array(_)) => {
                    warn!(idx, "Empty weeks list, keeping entry as one record");
                    self.push_record(idx, entry, &mut records);
                }
                _ => self.push_record(idx, entry, &mut records),
            }
        }
        records
    }

    /// One record per sub-period; sub-period fields win over the parent's.
    fn expand_periods(
        &self,
        idx: usize,
        parent: &Value,
        periods: &[Value],
        out: &mut Vec<EmployeeTimesheet>,
    ) {
        let Some(parent) = parent.as_object() else {
            return;
        };
        let mut base = parent.clone();
        base.remove(PERIODS_KEY);

        for period in periods {
            let Some(fields) = period.as_object() else {
                warn!(idx, period = %period, "Skipping non-object period entry");
                continue;
            };
            let mut merged = base.clone();
            merged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            self.push_record(idx, &Value::Object(merged), out);
        }
    }

    fn push_record(&self, idx: usize, entry: &Value, out: &mut Vec<EmployeeTimesheet>) {
        match EmployeeTimesheet::from_value(entry, self.tolerance) {
            Ok(record) => out.push(record),
            Err(e) => warn!(idx, error = %e, entry = %entry, "Skipping invalid employee entry"),
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timesheet::Weekday;
    use serde_json::json;

    fn normalize(value: Value) -> Vec<EmployeeTimesheet> {
        Normalizer::default().normalize(&value)
    }

    #[test]
    fn empty_employee_list_is_valid() {
        assert!(normalize(json!({"employees": []})).is_empty());
    }

    #[test]
    fn classifies_each_shape() {
        let list = json!([{"total_hours": 1}]);
        assert!(matches!(RecoveredShape::classify(&list), RecoveredShape::List(items) if items.len() == 1));

        let container = json!({"employees": []});
        assert!(matches!(
            RecoveredShape::classify(&container),
            RecoveredShape::Container { key: "employees", .. }
        ));

        let alt = json!({"summary": "x", "records": [{}]});
        assert!(matches!(
            RecoveredShape::classify(&alt),
            RecoveredShape::Container { key: "records", .. }
        ));

        let single = json!({"client_name": "Jane", "total_hours": 40});
        assert!(matches!(RecoveredShape::classify(&single), RecoveredShape::SingleRecord(_)));

        assert_eq!(RecoveredShape::classify(&json!({"status": "ok"})), RecoveredShape::Unrecognized);
        assert_eq!(RecoveredShape::classify(&json!("text")), RecoveredShape::Unrecognized);
        assert_eq!(RecoveredShape::classify(&json!(null)), RecoveredShape::Unrecognized);
    }

    #[test]
    fn employees_key_beats_fallbacks() {
        let value = json!({
            "data": [{"client_name": "Wrong", "total_hours": 1}],
            "employees": [{"client_name": "Right", "total_hours": 2}]
        });
        let records = normalize(value);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].client_name.as_deref(), Some("Right"));
    }

    #[test]
    fn non_list_employees_falls_through_to_fallback() {
        let value = json!({
            "employees": "none",
            "items": [{"client_name": "Item", "total_hours": 3}]
        });
        let records = normalize(value);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].total_hours, 3.0);
    }

    #[test]
    fn flat_record_becomes_single_element() {
        let records = normalize(json!({"client_name": "Jane", "total_hours": 37.5}));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].total_hours, 37.5);
    }

    #[test]
    fn unrecognized_object_yields_nothing() {
        assert!(normalize(json!({"message": "no timesheet here"})).is_empty());
        assert!(normalize(json!(42)).is_empty());
    }

    #[test]
    fn top_level_array_preserves_order() {
        let records = normalize(json!([
            {"client_name": "A", "total_hours": 1},
            {"client_name": "B", "total_hours": 2},
            {"client_name": "C", "total_hours": 3}
        ]));
        let names: Vec<_> = records.iter().filter_map(|r| r.client_name.as_deref()).collect();
        assert_eq!(names, ["A", "B", "C"]);
    }

    #[test]
    fn invalid_entries_are_skipped_not_fatal() {
        let records = normalize(json!({"employees": [
            {"client_name": "NoTotal"},
            "just a string",
            {"client_name": "Good", "total_hours": 8},
            {"client_name": "BadDay", "week_hours": [{"day": "Xyz", "hours": 1}], "total_hours": 1}
        ]}));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].client_name.as_deref(), Some("Good"));
    }

    #[test]
    fn weeks_expand_with_period_fields_taking_precedence() {
        let records = normalize(json!({"employees": [{
            "client_name": "Jane Smith",
            "period": "October",
            "total_hours": 0,
            "weeks": [
                {
                    "period": "Week 1",
                    "week_start": "2025-10-06",
                    "week_hours": [{"day": "Mon", "hours": 8}, {"day": "Tue", "hours": 8}],
                    "total_hours": 16
                },
                {"period": "Week 2", "week_start": "2025-10-13", "total_hours": 20}
            ]
        }]}));

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.client_name.as_deref() == Some("Jane Smith")));
        assert_eq!(records[0].period.as_deref(), Some("Week 1"));
        assert_eq!(records[0].total_hours, 16.0);
        assert_eq!(records[0].week_hours.as_ref().unwrap()[1].day, Weekday::Tue);
        assert_eq!(records[1].period.as_deref(), Some("Week 2"));
        assert_eq!(records[1].week_start.as_deref(), Some("2025-10-13"));
        assert!(records[1].week_hours.is_none());
    }

    #[test]
    fn weeks_inherit_parent_total_when_missing() {
        let records = normalize(json!([{
            "employee_name": "Raj",
            "total_hours": 5,
            "weeks": [{"period": "W1"}, 17, {"period": "W2", "total_hours": 6}]
        }]));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].total_hours, 5.0);
        assert_eq!(records[1].total_hours, 6.0);
    }

    #[test]
    fn empty_weeks_keep_the_parent_record() {
        let records = normalize(json!({"employees": [
            {"client_name": "Jane", "total_hours": 12, "weeks": []}
        ]}));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].client_name.as_deref(), Some("Jane"));
        assert_eq!(records[0].total_hours, 12.0);
    }

    #[test]
    fn reconciliation_applies_inside_containers() {
        let records = normalize(json!({"employees": [{
            "week_hours": [{"day": "Mon", "hours": 8}, {"day": "Tue", "hours": 8}],
            "total_hours": 99
        }]}));
        assert_eq!(records[0].total_hours, 16.0);
    }

    #[test]
    fn custom_tolerance_is_used() {
        let value = json!([{"week_hours": [{"day": "Mon", "hours": 8}], "total_hours": 9}]);
        assert_eq!(Normalizer::new(2.0).normalize(&value)[0].total_hours, 9.0);
        assert_eq!(Normalizer::new(0.1).normalize(&value)[0].total_hours, 8.0);
    }
}
