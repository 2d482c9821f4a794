//! Default value providers for attributes
//!
//! Defaults run during planning when an optional attribute is left null in
//! configuration. Attach them through `AttributeBuilder::default`.

use crate::schema::{Default, DefaultRequest, DefaultResponse};
use crate::types::{Dynamic, DynamicValue};

/// A fixed default value.
pub struct StaticDefault {
    value: Dynamic,
}

impl StaticDefault {
    pub fn create(value: Dynamic) -> Box<dyn Default> {
        Box::new(Self { value })
    }

    pub fn string(value: &str) -> Box<dyn Default> {
        Self::create(Dynamic::String(value.to_string()))
    }

    pub fn number(value: f64) -> Box<dyn Default> {
        Self::create(Dynamic::Number(value))
    }

    pub fn bool(value: bool) -> Box<dyn Default> {
        Self::create(Dynamic::Bool(value))
    }
}

impl Default for StaticDefault {
    fn description(&self) -> String {
        format!("defaults to {:?}", self.value)
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        DefaultResponse {
            value: DynamicValue::new(self.value.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributePath;

    fn request() -> DefaultRequest {
        DefaultRequest {
            path: AttributePath::new("attr"),
        }
    }

    #[test]
    fn static_default_returns_value() {
        let default = StaticDefault::string("deny-all");
        let response = default.default_value(request());
        assert_eq!(
            response.value.value,
            Dynamic::String("deny-all".to_string())
        );

        let default = StaticDefault::bool(true);
        let response = default.default_value(request());
        assert_eq!(response.value.value, Dynamic::Bool(true));
    }

    #[test]
    fn static_default_number() {
        let default = StaticDefault::number(443.0);
        let response = default.default_value(request());
        assert_eq!(response.value.value, Dynamic::Number(443.0));
    }
}
