//! Stateless carbon-footprint formula.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// kg CO₂ per unit of each tracked category.
pub const EMISSION_FACTORS: [(&str, f64); 5] = [
    ("electricity", 0.4),  // per kWh
    ("transportation", 0.2), // per mile
    ("natural_gas", 0.18), // per cubic foot
    ("water", 0.001),      // per gallon
    ("waste", 0.5),        // per pound
];

const UNIT: &str = "kg CO₂";

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CategoryReading {
    Measured {
        value: f64,
        emissions: f64,
        unit: &'static str,
    },
    Invalid {
        error: String,
    },
}

#[derive(Debug, Serialize)]
pub struct CarbonReport {
    pub breakdown: BTreeMap<&'static str, CategoryReading>,
    pub total_emissions: f64,
    pub unit: &'static str,
    pub comparison: &'static str,
    pub recommendations: Vec<&'static str>,
    pub calculation_timestamp: DateTime<Utc>,
}

/// Computes per-category emissions from a free-form JSON object.
///
/// Absent, null, empty-string, and zero inputs are skipped entirely; a value
/// that is present but unparsable yields a per-category error entry rather
/// than failing the whole calculation. Numeric strings are accepted.
pub fn calculate(data: &serde_json::Map<String, Value>) -> CarbonReport {
    let mut breakdown = BTreeMap::new();
    let mut total = 0.0;

    for (category, factor) in EMISSION_FACTORS {
        let Some(raw) = data.get(category) else { continue };
        let Some(reading) = parse_reading(raw) else { continue };
        match reading {
            Ok(value) => {
                total += value * factor;
                breakdown.insert(
                    category,
                    CategoryReading::Measured {
                        value,
                        emissions: round2(value * factor),
                        unit: UNIT,
                    },
                );
            }
            Err(()) => {
                breakdown.insert(
                    category,
                    CategoryReading::Invalid {
                        error: format!("Invalid value for {category}"),
                    },
                );
            }
        }
    }

    let comparison = if total < 50.0 {
        "below average"
    } else if total < 100.0 {
        "average"
    } else {
        "above average"
    };

    let mut recommendations = Vec::new();
    if total > 100.0 {
        recommendations.push("Consider switching to renewable energy sources");
        recommendations.push("Use public transportation or electric vehicles");
    }
    if total > 50.0 {
        recommendations.push("Improve home insulation to reduce heating/cooling needs");
        recommendations.push("Reduce, reuse, and recycle to minimize waste");
    }

    CarbonReport {
        breakdown,
        total_emissions: round2(total),
        unit: UNIT,
        comparison,
        recommendations,
        calculation_timestamp: Utc::now(),
    }
}

/// `None` means skipped (absent/empty/zero), `Some(Err(()))` present but
/// unparsable.
fn parse_reading(raw: &Value) -> Option<Result<f64, ()>> {
    match raw {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some(Ok(1.0)),
        Value::Number(n) => {
            let value = n.as_f64().unwrap_or(0.0);
            if value == 0.0 { None } else { Some(Ok(value)) }
        }
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().parse::<f64>().map_err(|_| ())),
        _ => Some(Err(())),
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn input(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn computes_emissions_per_category() {
        let report = calculate(&input(json!({
            "electricity": 100,
            "transportation": 50.0,
        })));

        match &report.breakdown["electricity"] {
            CategoryReading::Measured { value, emissions, unit } => {
                assert_eq!(*value, 100.0);
                assert_eq!(*emissions, 40.0);
                assert_eq!(*unit, "kg CO₂");
            }
            other => panic!("unexpected reading: {other:?}"),
        }
        assert_eq!(report.total_emissions, 50.0);
        assert_eq!(report.comparison, "average");
    }

    #[test]
    fn accepts_numeric_strings() {
        let report = calculate(&input(json!({"waste": "20"})));
        match &report.breakdown["waste"] {
            CategoryReading::Measured { emissions, .. } => assert_eq!(*emissions, 10.0),
            other => panic!("unexpected reading: {other:?}"),
        }
    }

    #[test]
    fn skips_absent_zero_and_empty_inputs() {
        let report = calculate(&input(json!({
            "electricity": 0,
            "water": "",
            "waste": null,
        })));
        assert!(report.breakdown.is_empty());
        assert_eq!(report.total_emissions, 0.0);
        assert_eq!(report.comparison, "below average");
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn unparsable_value_yields_error_entry() {
        let report = calculate(&input(json!({
            "electricity": "lots",
            "waste": 10,
        })));
        assert!(matches!(
            report.breakdown["electricity"],
            CategoryReading::Invalid { .. }
        ));
        // The bad category does not poison the rest.
        assert_eq!(report.total_emissions, 5.0);
    }

    #[test]
    fn comparison_thresholds_and_recommendations() {
        let low = calculate(&input(json!({"electricity": 10})));
        assert_eq!(low.comparison, "below average");
        assert!(low.recommendations.is_empty());

        let mid = calculate(&input(json!({"electricity": 150})));
        assert_eq!(mid.comparison, "average");
        assert_eq!(mid.recommendations.len(), 2);

        let high = calculate(&input(json!({"electricity": 300})));
        assert_eq!(high.comparison, "above average");
        assert_eq!(high.recommendations.len(), 4);
    }

    #[test]
    fn emissions_are_rounded_to_cents() {
        let report = calculate(&input(json!({"water": 3333})));
        match &report.breakdown["water"] {
            CategoryReading::Measured { emissions, .. } => assert_eq!(*emissions, 3.33),
            other => panic!("unexpected reading: {other:?}"),
        }
    }
}
