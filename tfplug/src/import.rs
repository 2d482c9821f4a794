//! Import helpers for resource implementations

use crate::context::Context;
use crate::resource::{ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource};
use crate::types::{AttributePath, Diagnostic, DynamicValue};

/// Copies the import ID into a single state attribute.
///
/// For resources whose import ID maps directly to one attribute, e.g.
/// ID "transit-gw" becoming state.gw_name. The resulting partial state is
/// refreshed by the follow-up ReadResource call Terraform issues after
/// import.
pub fn import_state_passthrough_id(
    _ctx: &Context,
    attr_path: AttributePath,
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    let mut state = DynamicValue::empty_object();

    if let Err(e) = state.set_string(&attr_path, request.id.clone()) {
        response.diagnostics.push(
            Diagnostic::error(
                "Failed to set import ID",
                format!("Could not set import ID '{}': {}", request.id, e),
            )
            .with_attribute(attr_path),
        );
        return;
    }

    response.imported_resources.push(ImportedResource {
        type_name: request.type_name.clone(),
        state,
        private: Vec::new(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_sets_id_attribute() {
        let ctx = Context::new();
        let request = ImportResourceStateRequest {
            type_name: "aviatrix_transit_gateway".to_string(),
            id: "transit-1".to_string(),
        };
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };

        import_state_passthrough_id(
            &ctx,
            AttributePath::new("gw_name"),
            &request,
            &mut response,
        );

        assert!(response.diagnostics.is_empty());
        assert_eq!(response.imported_resources.len(), 1);
        let imported = &response.imported_resources[0];
        assert_eq!(imported.type_name, "aviatrix_transit_gateway");
        assert_eq!(
            imported
                .state
                .get_string(&AttributePath::new("gw_name"))
                .unwrap(),
            "transit-1"
        );
    }
}
