//! Built-in plan modifiers
//!
//! Attach these to attributes through `AttributeBuilder::plan_modifier`.
//! They run during planning, after defaults have been applied.

use crate::schema::{PlanModifier, PlanModifierRequest, PlanModifierResponse};
use crate::types::Dynamic;

/// Forces replacement of the resource when the attribute changes.
pub struct RequiresReplace;

impl RequiresReplace {
    pub fn create() -> Box<dyn PlanModifier> {
        Box::new(Self)
    }
}

impl PlanModifier for RequiresReplace {
    fn description(&self) -> String {
        "changing this attribute requires replacing the resource".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let state = &request.state_value.value;
        let plan = &request.plan_value.value;

        // No replacement on create, destroy, or while either side is unknown.
        let requires_replace = !matches!(
            (state, plan),
            (Dynamic::Null, _) | (_, Dynamic::Null) | (Dynamic::Unknown, _) | (_, Dynamic::Unknown)
        ) && state != plan;

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: vec![],
        }
    }
}

/// Keeps the prior state value when the planned value is unknown.
///
/// Useful for computed attributes that do not change on update, so plans
/// show "(known after apply)" only when the value really can change.
pub struct UseStateForUnknown;

impl UseStateForUnknown {
    pub fn create() -> Box<dyn PlanModifier> {
        Box::new(Self)
    }
}

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "use the prior state value when the planned value is unknown".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let plan_value = match &request.plan_value.value {
            // Unknown can arrive decoded as Null from msgpack.
            Dynamic::Unknown | Dynamic::Null => match &request.state_value.value {
                Dynamic::Null => request.plan_value,
                _ => request.state_value.clone(),
            },
            _ => request.plan_value,
        };

        PlanModifierResponse {
            plan_value,
            requires_replace: false,
            diagnostics: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributePath, DynamicValue};

    fn request(state: Dynamic, plan: Dynamic, config: Dynamic) -> PlanModifierRequest {
        PlanModifierRequest {
            state_value: DynamicValue::new(state),
            plan_value: DynamicValue::new(plan),
            config_value: DynamicValue::new(config),
            path: AttributePath::new("attr"),
        }
    }

    #[test]
    fn requires_replace_on_change() {
        let modifier = RequiresReplace;
        let response = modifier.modify(request(
            Dynamic::String("us-west-2".to_string()),
            Dynamic::String("us-east-1".to_string()),
            Dynamic::String("us-east-1".to_string()),
        ));
        assert!(response.requires_replace);
    }

    #[test]
    fn requires_replace_skips_create() {
        let modifier = RequiresReplace;
        let response = modifier.modify(request(
            Dynamic::Null,
            Dynamic::String("us-east-1".to_string()),
            Dynamic::String("us-east-1".to_string()),
        ));
        assert!(!response.requires_replace);
    }

    #[test]
    fn requires_replace_skips_unchanged() {
        let modifier = RequiresReplace;
        let response = modifier.modify(request(
            Dynamic::String("us-east-1".to_string()),
            Dynamic::String("us-east-1".to_string()),
            Dynamic::String("us-east-1".to_string()),
        ));
        assert!(!response.requires_replace);
    }

    #[test]
    fn use_state_for_unknown_keeps_state() {
        let modifier = UseStateForUnknown;
        let response = modifier.modify(request(
            Dynamic::String("10.0.0.1".to_string()),
            Dynamic::Unknown,
            Dynamic::Null,
        ));
        assert_eq!(
            response.plan_value.value,
            Dynamic::String("10.0.0.1".to_string())
        );
    }

    #[test]
    fn use_state_for_unknown_keeps_plan_when_set() {
        let modifier = UseStateForUnknown;
        let response = modifier.modify(request(
            Dynamic::String("old".to_string()),
            Dynamic::String("new".to_string()),
            Dynamic::String("new".to_string()),
        ));
        assert_eq!(response.plan_value.value, Dynamic::String("new".to_string()));
    }
}
