//! Fixed clinical feature schema and request-side validation.
//!
//! The order of [`Feature::ALL`] is the model's input order; training,
//! scaling and inference all index by it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const FEATURE_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Pregnancies,
    Glucose,
    BloodPressure,
    SkinThickness,
    Insulin,
    Bmi,
    DiabetesPedigreeFunction,
    Age,
}

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::Pregnancies,
        Feature::Glucose,
        Feature::BloodPressure,
        Feature::SkinThickness,
        Feature::Insulin,
        Feature::Bmi,
        Feature::DiabetesPedigreeFunction,
        Feature::Age,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::Pregnancies => "pregnancies",
            Feature::Glucose => "glucose",
            Feature::BloodPressure => "blood_pressure",
            Feature::SkinThickness => "skin_thickness",
            Feature::Insulin => "insulin",
            Feature::Bmi => "bmi",
            Feature::DiabetesPedigreeFunction => "diabetes_pedigree_function",
            Feature::Age => "age",
        }
    }

    /// Inclusive `(min, max)` accepted by the service.
    pub fn range(self) -> (f64, f64) {
        match self {
            Feature::Pregnancies => (0.0, 20.0),
            Feature::Glucose => (0.0, 500.0),
            Feature::BloodPressure => (0.0, 200.0),
            Feature::SkinThickness => (0.0, 100.0),
            Feature::Insulin => (0.0, 1000.0),
            Feature::Bmi => (0.0, 100.0),
            Feature::DiabetesPedigreeFunction => (0.0, 5.0),
            Feature::Age => (0.0, 150.0),
        }
    }

    pub fn unit(self) -> Option<&'static str> {
        match self {
            Feature::Glucose => Some("mg/dL"),
            Feature::BloodPressure => Some("mm Hg"),
            Feature::SkinThickness => Some("mm"),
            Feature::Insulin => Some("mu U/ml"),
            Feature::Bmi => Some("kg/m²"),
            Feature::Age => Some("years"),
            Feature::Pregnancies | Feature::DiabetesPedigreeFunction => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_name(name: &str) -> Option<Feature> {
        Feature::ALL.into_iter().find(|f| f.name() == name)
    }

    fn check(self, value: f64) -> std::result::Result<f64, String> {
        let (min, max) = self.range();
        if !value.is_finite() {
            return Err("must be a finite number".to_string());
        }
        if value < min || value > max {
            return Err(format!(
                "must be between {} and {} (got {})",
                min, max, value
            ));
        }
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("'features' must be a dictionary mapping feature names to numbers")]
    NotAnObject,

    #[error("Missing required features: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("Validation failed: {}", join_field_errors(.0))]
    Invalid(Vec<FieldError>),
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Eight validated values in schema order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn from_json(value: &serde_json::Value) -> std::result::Result<Self, FeatureError> {
        let map = value.as_object().ok_or(FeatureError::NotAnObject)?;

        let missing: Vec<&'static str> = Feature::ALL
            .iter()
            .map(|f| f.name())
            .filter(|name| !map.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            return Err(FeatureError::Missing(missing));
        }

        for key in map.keys() {
            if Feature::from_name(key).is_none() {
                tracing::debug!("Ignoring unknown feature '{}'", key);
            }
        }

        let mut values = [0.0; FEATURE_COUNT];
        let mut errors = Vec::new();
        for feature in Feature::ALL {
            let raw = &map[feature.name()];
            let checked = match raw.as_f64() {
                Some(number) => feature.check(number),
                None => Err("must be a number".to_string()),
            };
            match checked {
                Ok(v) => values[feature.index()] = v,
                Err(message) => errors.push(FieldError {
                    field: feature.name().to_string(),
                    message,
                }),
            }
        }

        if errors.is_empty() {
            Ok(Self(values))
        } else {
            Err(FeatureError::Invalid(errors))
        }
    }

    pub fn from_values(values: [f64; FEATURE_COUNT]) -> std::result::Result<Self, FeatureError> {
        let errors: Vec<FieldError> = Feature::ALL
            .iter()
            .filter_map(|f| {
                f.check(values[f.index()]).err().map(|message| FieldError {
                    field: f.name().to_string(),
                    message,
                })
            })
            .collect();

        if errors.is_empty() {
            Ok(Self(values))
        } else {
            Err(FeatureError::Invalid(errors))
        }
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.index()]
    }

    pub fn as_array(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_payload() -> serde_json::Value {
        json!({
            "pregnancies": 6,
            "glucose": 148,
            "blood_pressure": 72,
            "skin_thickness": 35,
            "insulin": 0,
            "bmi": 33.6,
            "diabetes_pedigree_function": 0.627,
            "age": 50
        })
    }

    #[test]
    fn test_schema_order_matches_indices() {
        for (i, feature) in Feature::ALL.iter().enumerate() {
            assert_eq!(feature.index(), i);
            assert_eq!(Feature::from_name(feature.name()), Some(*feature));
        }
        assert_eq!(Feature::from_name("outcome"), None);
    }

    #[test]
    fn test_valid_payload_is_ordered() {
        let vector = FeatureVector::from_json(&valid_payload()).unwrap();
        assert_eq!(
            vector.as_array(),
            &[6.0, 148.0, 72.0, 35.0, 0.0, 33.6, 0.627, 50.0]
        );
        assert_eq!(vector.get(Feature::Bmi), 33.6);
    }

    #[test]
    fn test_non_object_is_rejected() {
        let err = FeatureVector::from_json(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(err, FeatureError::NotAnObject);
        assert!(err.to_string().contains("dictionary"));
    }

    #[test]
    fn test_missing_features_listed_in_schema_order() {
        let err = FeatureVector::from_json(&json!({"glucose": 130, "blood_pressure": 80}))
            .unwrap_err();
        match &err {
            FeatureError::Missing(names) => {
                assert_eq!(
                    names,
                    &vec![
                        "pregnancies",
                        "skin_thickness",
                        "insulin",
                        "bmi",
                        "diabetes_pedigree_function",
                        "age"
                    ]
                );
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err
            .to_string()
            .to_lowercase()
            .starts_with("missing required features"));
    }

    #[test]
    fn test_all_field_errors_are_collected() {
        let mut payload = valid_payload();
        payload["pregnancies"] = json!("not a number");
        payload["glucose"] = json!(1000);
        payload["age"] = json!(null);

        let err = FeatureVector::from_json(&payload).unwrap_err();
        let FeatureError::Invalid(errors) = &err else {
            panic!("expected field errors, got {:?}", err);
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["pregnancies", "glucose", "age"]);
        assert_eq!(errors[0].message, "must be a number");
        assert_eq!(errors[1].message, "must be between 0 and 500 (got 1000)");

        let message = err.to_string();
        assert!(message.starts_with("Validation failed:"));
        assert!(message.contains("glucose must be between 0 and 500"));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let mut payload = valid_payload();
        payload["diabetes_pedigree_function"] = json!(5.0);
        payload["pregnancies"] = json!(0);
        assert!(FeatureVector::from_json(&payload).is_ok());

        payload["bmi"] = json!(-0.1);
        assert!(FeatureVector::from_json(&payload).is_err());
    }

    #[test]
    fn test_booleans_are_not_numbers() {
        let mut payload = valid_payload();
        payload["insulin"] = json!(true);
        let err = FeatureVector::from_json(&payload).unwrap_err();
        assert!(err.to_string().contains("insulin must be a number"));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let mut payload = valid_payload();
        payload["outcome"] = json!(1);
        assert!(FeatureVector::from_json(&payload).is_ok());
    }

    #[test]
    fn test_from_values_checks_ranges() {
        assert!(FeatureVector::from_values([1.0, 85.0, 66.0, 29.0, 0.0, 26.6, 0.351, 31.0]).is_ok());
        let err = FeatureVector::from_values([1.0, 85.0, 66.0, 29.0, 0.0, 26.6, f64::NAN, 31.0])
            .unwrap_err();
        assert!(err.to_string().contains("diabetes_pedigree_function"));
    }
}
