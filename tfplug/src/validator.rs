//! Built-in attribute validators
//!
//! Attach these to attributes through `AttributeBuilder::validator`. They run
//! during config validation, before any plan or apply.

use crate::schema::{Validator, ValidatorRequest, ValidatorResponse};
use crate::types::{Diagnostic, Dynamic};

/// Requires a string value to be one of a fixed set.
pub struct StringInSliceValidator {
    allowed: Vec<String>,
}

impl StringInSliceValidator {
    pub fn create(allowed: &[&str]) -> Box<dyn Validator> {
        Box::new(Self {
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl Validator for StringInSliceValidator {
    fn description(&self) -> String {
        format!("value must be one of: {}", self.allowed.join(", "))
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];

        if let Dynamic::String(s) = &request.config_value.value {
            if !self.allowed.iter().any(|a| a == s) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid attribute value",
                        format!("'{}' is not valid, {}", s, self.description()),
                    )
                    .with_attribute(request.path),
                );
            }
        }

        ValidatorResponse { diagnostics }
    }
}

/// Bounds the length of a string value.
pub struct StringLengthValidator {
    min: Option<usize>,
    max: Option<usize>,
}

impl StringLengthValidator {
    pub fn create(min: Option<usize>, max: Option<usize>) -> Box<dyn Validator> {
        Box::new(Self { min, max })
    }
}

impl Validator for StringLengthValidator {
    fn description(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("length must be between {} and {}", min, max),
            (Some(min), None) => format!("length must be at least {}", min),
            (None, Some(max)) => format!("length must be at most {}", max),
            (None, None) => "any length".to_string(),
        }
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];

        if let Dynamic::String(s) = &request.config_value.value {
            let out_of_range = self.min.is_some_and(|min| s.len() < min)
                || self.max.is_some_and(|max| s.len() > max);
            if out_of_range {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid attribute length",
                        format!("got length {}, {}", s.len(), self.description()),
                    )
                    .with_attribute(request.path),
                );
            }
        }

        ValidatorResponse { diagnostics }
    }
}

/// Bounds a number value to an inclusive range.
pub struct NumberRangeValidator {
    min: Option<f64>,
    max: Option<f64>,
}

impl NumberRangeValidator {
    pub fn create(min: Option<f64>, max: Option<f64>) -> Box<dyn Validator> {
        Box::new(Self { min, max })
    }
}

impl Validator for NumberRangeValidator {
    fn description(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("value must be between {} and {}", min, max),
            (Some(min), None) => format!("value must be at least {}", min),
            (None, Some(max)) => format!("value must be at most {}", max),
            (None, None) => "any value".to_string(),
        }
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];

        if let Dynamic::Number(n) = &request.config_value.value {
            let out_of_range =
                self.min.is_some_and(|min| *n < min) || self.max.is_some_and(|max| *n > max);
            if out_of_range {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid attribute value",
                        format!("got {}, {}", n, self.description()),
                    )
                    .with_attribute(request.path),
                );
            }
        }

        ValidatorResponse { diagnostics }
    }
}

/// Bounds the element count of a list value.
pub struct ListLengthValidator {
    min: Option<usize>,
    max: Option<usize>,
}

impl ListLengthValidator {
    pub fn create(min: Option<usize>, max: Option<usize>) -> Box<dyn Validator> {
        Box::new(Self { min, max })
    }
}

impl Validator for ListLengthValidator {
    fn description(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => {
                format!("list must have between {} and {} elements", min, max)
            }
            (Some(min), None) => format!("list must have at least {} elements", min),
            (None, Some(max)) => format!("list must have at most {} elements", max),
            (None, None) => "any number of elements".to_string(),
        }
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];

        if let Dynamic::List(l) = &request.config_value.value {
            let out_of_range = self.min.is_some_and(|min| l.len() < min)
                || self.max.is_some_and(|max| l.len() > max);
            if out_of_range {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid attribute length",
                        format!("got {} elements, {}", l.len(), self.description()),
                    )
                    .with_attribute(request.path),
                );
            }
        }

        ValidatorResponse { diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributePath, DynamicValue};

    fn request(value: Dynamic) -> ValidatorRequest {
        ValidatorRequest {
            config_value: DynamicValue::new(value),
            path: AttributePath::new("attr"),
        }
    }

    #[test]
    fn string_in_slice_accepts_listed_value() {
        let validator = StringInSliceValidator::create(&["allow-all", "deny-all"]);
        let response = validator.validate(request(Dynamic::String("deny-all".to_string())));
        assert!(response.diagnostics.is_empty());
    }

    #[test]
    fn string_in_slice_rejects_other_values() {
        let validator = StringInSliceValidator::create(&["allow-all", "deny-all"]);
        let response = validator.validate(request(Dynamic::String("deny-some".to_string())));
        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].detail.contains("deny-some"));
    }

    #[test]
    fn string_in_slice_ignores_null() {
        let validator = StringInSliceValidator::create(&["a"]);
        let response = validator.validate(request(Dynamic::Null));
        assert!(response.diagnostics.is_empty());
    }

    #[test]
    fn number_range_flags_out_of_range() {
        let validator = NumberRangeValidator::create(Some(10.0), Some(50.0));
        assert!(validator
            .validate(request(Dynamic::Number(30.0)))
            .diagnostics
            .is_empty());
        assert_eq!(
            validator
                .validate(request(Dynamic::Number(9.0)))
                .diagnostics
                .len(),
            1
        );
    }

    #[test]
    fn list_length_bounds() {
        let validator = ListLengthValidator::create(Some(1), Some(2));
        assert!(validator
            .validate(request(Dynamic::List(vec![Dynamic::Number(6.0)])))
            .diagnostics
            .is_empty());
        assert_eq!(
            validator.validate(request(Dynamic::List(vec![]))).diagnostics.len(),
            1
        );
        assert_eq!(
            validator
                .validate(request(Dynamic::List(vec![
                    Dynamic::Number(1.0),
                    Dynamic::Number(2.0),
                    Dynamic::Number(3.0),
                ])))
                .diagnostics
                .len(),
            1
        );
    }

    #[test]
    fn list_length_ignores_non_list_values() {
        let validator = ListLengthValidator::create(Some(1), None);
        let response = validator.validate(request(Dynamic::Null));
        assert!(response.diagnostics.is_empty());
    }

    #[test]
    fn string_length_bounds() {
        let validator = StringLengthValidator::create(Some(1), Some(4));
        assert!(validator
            .validate(request(Dynamic::String("ok".to_string())))
            .diagnostics
            .is_empty());
        assert_eq!(
            validator
                .validate(request(Dynamic::String("too long".to_string())))
                .diagnostics
                .len(),
            1
        );
    }
}
