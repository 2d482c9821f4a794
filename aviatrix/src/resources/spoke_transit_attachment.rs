//! Attachment of a spoke gateway to a transit gateway

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::plan_modifier::RequiresReplace;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ImportedResource,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

#[derive(Default)]
pub struct SpokeTransitAttachmentResource {
    provider_data: Option<crate::AviatrixProviderData>,
}

impl SpokeTransitAttachmentResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn extract_names(&self, config: &DynamicValue) -> Result<(String, String), Diagnostic> {
        let spoke = config
            .get_string(&AttributePath::new("spoke_gw_name"))
            .map_err(|_| {
                Diagnostic::error(
                    "Missing spoke_gw_name",
                    "The 'spoke_gw_name' attribute is required",
                )
            })?;
        let transit = config
            .get_string(&AttributePath::new("transit_gw_name"))
            .map_err(|_| {
                Diagnostic::error(
                    "Missing transit_gw_name",
                    "The 'transit_gw_name' attribute is required",
                )
            })?;
        Ok((spoke, transit))
    }
}

#[async_trait]
impl Resource for SpokeTransitAttachmentResource {
    fn type_name(&self) -> &str {
        "aviatrix_spoke_transit_attachment"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Attaches an Aviatrix spoke gateway to a transit gateway")
            .attribute(
                AttributeBuilder::new("spoke_gw_name", AttributeType::String)
                    .description("Name of the spoke gateway")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("transit_gw_name", AttributeType::String)
                    .description("Name of the transit gateway")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn create(
        &self,
        _ctx: Context,
        request: CreateResourceRequest,
    ) -> CreateResourceResponse {
        let mut diagnostics = vec![];

        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                diagnostics.push(Diagnostic::error(
                    "Provider not configured",
                    "Provider data was not properly configured",
                ));
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        let (spoke, transit) = match self.extract_names(&request.config) {
            Ok(names) => names,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        if let Err(e) = provider_data
            .client
            .attach_spoke_to_transit(&spoke, &transit)
            .await
        {
            diagnostics.push(Diagnostic::error(
                "Failed to attach spoke to transit",
                format!("API error: {}", e),
            ));
        }

        CreateResourceResponse {
            new_state: request.planned_state,
            diagnostics,
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = vec![];

        let (spoke, transit) = match self.extract_names(&request.current_state) {
            Ok(names) => names,
            Err(_) => {
                return ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                    private: request.private,
                };
            }
        };

        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                diagnostics.push(Diagnostic::error(
                    "Provider not configured",
                    "Provider data was not properly configured",
                ));
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                    private: request.private,
                };
            }
        };

        match provider_data.client.is_spoke_attached(&spoke, &transit).await {
            Ok(true) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics,
                private: request.private,
            },
            Ok(false) => ReadResourceResponse {
                new_state: None,
                diagnostics,
                private: request.private,
            },
            Err(e) if e.is_not_found() => ReadResourceResponse {
                new_state: None,
                diagnostics,
                private: request.private,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read spoke attachment",
                    format!("API error: {}", e),
                ));
                ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                    private: request.private,
                }
            }
        }
    }

    async fn update(
        &self,
        _ctx: Context,
        request: UpdateResourceRequest,
    ) -> UpdateResourceResponse {
        // Both attributes force replacement, so nothing is updatable in place.
        UpdateResourceResponse {
            new_state: request.planned_state,
            diagnostics: vec![],
        }
    }

    async fn delete(
        &self,
        _ctx: Context,
        request: DeleteResourceRequest,
    ) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => return DeleteResourceResponse { diagnostics },
        };

        let (spoke, transit) = match self.extract_names(&request.prior_state) {
            Ok(names) => names,
            Err(_) => return DeleteResourceResponse { diagnostics },
        };

        if let Err(e) = provider_data
            .client
            .detach_spoke_from_transit(&spoke, &transit)
            .await
        {
            diagnostics.push(Diagnostic::error(
                "Failed to detach spoke from transit",
                format!("API error: {}", e),
            ));
        }

        DeleteResourceResponse { diagnostics }
    }

    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };

        let parts: Vec<&str> = request.id.split('~').collect();
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            response.diagnostics.push(Diagnostic::error(
                "Invalid import ID",
                format!(
                    "Expected import ID in the form 'spoke_gw_name~transit_gw_name', got '{}'",
                    request.id
                ),
            ));
            return response;
        }

        let mut state = DynamicValue::empty_object();
        let _ = state.set_string(
            &AttributePath::new("spoke_gw_name"),
            parts[0].to_string(),
        );
        let _ = state.set_string(
            &AttributePath::new("transit_gw_name"),
            parts[1].to_string(),
        );

        response.imported_resources.push(ImportedResource {
            type_name: request.type_name,
            state,
            private: vec![],
        });
        response
    }
}

#[async_trait]
impl ResourceWithConfigure for SpokeTransitAttachmentResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];

        if let Some(data) = request.provider_data {
            if let Some(provider_data) = data.downcast_ref::<crate::AviatrixProviderData>() {
                self.provider_data = Some(provider_data.clone());
            } else {
                diagnostics.push(Diagnostic::error(
                    "Invalid provider data",
                    "Failed to extract AviatrixProviderData from provider data",
                ));
            }
        } else {
            diagnostics.push(Diagnostic::error(
                "No provider data",
                "No provider data was provided to the resource",
            ));
        }

        ConfigureResourceResponse { diagnostics }
    }
}
