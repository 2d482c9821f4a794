//! Spoke gateway resource

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::plan_modifier::RequiresReplace;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

use crate::api::{ApiError, Client, SpokeGatewayRequest, CLOUD_TYPE_GCP};
use crate::resources::util::{bool_or, string_or_default};

#[derive(Default)]
pub struct SpokeGatewayResource {
    provider_data: Option<crate::AviatrixProviderData>,
}

#[derive(Debug)]
struct SpokeConfig {
    request: SpokeGatewayRequest,
    single_az_ha: bool,
    ha_subnet: String,
    ha_zone: String,
}

impl SpokeGatewayResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn extract_spoke_config(&self, config: &DynamicValue) -> Result<SpokeConfig, Diagnostic> {
        let request = SpokeGatewayRequest {
            account_name: config
                .get_string(&AttributePath::new("account_name"))
                .map_err(|_| {
                    Diagnostic::error(
                        "Missing account_name",
                        "The 'account_name' attribute is required",
                    )
                })?,
            cloud_type: config
                .get_number(&AttributePath::new("cloud_type"))
                .map_err(|_| {
                    Diagnostic::error(
                        "Missing cloud_type",
                        "The 'cloud_type' attribute is required",
                    )
                })? as i64,
            gw_name: config
                .get_string(&AttributePath::new("gw_name"))
                .map_err(|_| {
                    Diagnostic::error("Missing gw_name", "The 'gw_name' attribute is required")
                })?,
            gw_size: config
                .get_string(&AttributePath::new("gw_size"))
                .map_err(|_| {
                    Diagnostic::error("Missing gw_size", "The 'gw_size' attribute is required")
                })?,
            vpc_id: config
                .get_string(&AttributePath::new("vpc_id"))
                .map_err(|_| {
                    Diagnostic::error("Missing vpc_id", "The 'vpc_id' attribute is required")
                })?,
            vpc_region: config
                .get_string(&AttributePath::new("vpc_reg"))
                .map_err(|_| {
                    Diagnostic::error("Missing vpc_reg", "The 'vpc_reg' attribute is required")
                })?,
            subnet: config
                .get_string(&AttributePath::new("subnet"))
                .map_err(|_| {
                    Diagnostic::error("Missing subnet", "The 'subnet' attribute is required")
                })?,
            insane_mode: bool_or(config, "insane_mode", false),
            zone: string_or_default(config, "zone"),
            eip: string_or_default(config, "eip"),
        };

        Ok(SpokeConfig {
            request,
            single_az_ha: bool_or(config, "single_az_ha", false),
            ha_subnet: string_or_default(config, "ha_subnet"),
            ha_zone: string_or_default(config, "ha_zone"),
        })
    }

    async fn refresh_state(
        &self,
        client: &Client,
        gw_name: &str,
        mut state: DynamicValue,
    ) -> Result<DynamicValue, ApiError> {
        let detail = client.get_gateway_info(gw_name).await?;

        let _ = state.set_string(&AttributePath::new("account_name"), detail.account_name.clone());
        let _ = state.set_number(&AttributePath::new("cloud_type"), detail.cloud_type as f64);
        let _ = state.set_string(&AttributePath::new("gw_name"), detail.gw_name.clone());
        let _ = state.set_string(&AttributePath::new("gw_size"), detail.gw_size.clone());
        let _ = state.set_string(&AttributePath::new("vpc_id"), detail.vpc_id.clone());
        let _ = state.set_string(&AttributePath::new("vpc_reg"), detail.vpc_region.clone());
        let _ = state.set_string(&AttributePath::new("subnet"), detail.subnet.clone());
        let _ = state.set_string(&AttributePath::new("public_ip"), detail.public_ip.clone());
        let _ = state.set_bool(
            &AttributePath::new("single_az_ha"),
            detail.single_az == "enabled",
        );
        let _ = state.set_bool(
            &AttributePath::new("insane_mode"),
            detail.insane_mode == "yes",
        );
        if !detail.zone.is_empty() {
            let _ = state.set_string(&AttributePath::new("zone"), detail.zone.clone());
        }

        match detail.ha_gateway() {
            Some(ha) if detail.cloud_type != CLOUD_TYPE_GCP => {
                let _ = state.set_string(&AttributePath::new("ha_subnet"), ha.subnet.clone());
            }
            Some(_) => {}
            None => {
                let _ = state.set_null(&AttributePath::new("ha_subnet"));
                let _ = state.set_null(&AttributePath::new("ha_zone"));
            }
        }

        Ok(state)
    }
}

#[async_trait]
impl Resource for SpokeGatewayResource {
    fn type_name(&self) -> &str {
        "aviatrix_spoke_gateway"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages an Aviatrix spoke gateway")
            .attribute(
                AttributeBuilder::new("account_name", AttributeType::String)
                    .description("Access account the gateway launches under")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("cloud_type", AttributeType::Number)
                    .description("Cloud provider ID (1 = AWS, 4 = GCP)")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("gw_name", AttributeType::String)
                    .description("Name of the spoke gateway")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("gw_size", AttributeType::String)
                    .description("Instance size of the gateway")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vpc_id", AttributeType::String)
                    .description("VPC the gateway launches in")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vpc_reg", AttributeType::String)
                    .description("Region of the VPC")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("subnet", AttributeType::String)
                    .description("Public subnet CIDR the gateway launches in")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("zone", AttributeType::String)
                    .description("Availability zone (GCP and Azure)")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("eip", AttributeType::String)
                    .description("Pre-allocated elastic IP to attach")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("insane_mode", AttributeType::Bool)
                    .description("Launch with high-performance encryption")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("single_az_ha", AttributeType::Bool)
                    .description("Enable single-AZ gateway restart on failure")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ha_subnet", AttributeType::String)
                    .description("Subnet for the HA peer (AWS/Azure)")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ha_zone", AttributeType::String)
                    .description("Zone for the HA peer (GCP)")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("public_ip", AttributeType::String)
                    .description("Public IP of the gateway")
                    .computed()
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
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];

        // HA placement must match the cloud: subnet everywhere but GCP,
        // zone on GCP.
        if let Ok(cloud_type) = request.config.get_number(&AttributePath::new("cloud_type")) {
            let cloud_type = cloud_type as i64;
            let ha_subnet = string_or_default(&request.config, "ha_subnet");
            let ha_zone = string_or_default(&request.config, "ha_zone");
            if cloud_type == CLOUD_TYPE_GCP && !ha_subnet.is_empty() {
                diagnostics.push(Diagnostic::error(
                    "Invalid ha_subnet",
                    "GCP spoke gateways use 'ha_zone' for HA placement, not 'ha_subnet'",
                ));
            }
            if cloud_type != CLOUD_TYPE_GCP && !ha_zone.is_empty() {
                diagnostics.push(Diagnostic::error(
                    "Invalid ha_zone",
                    "'ha_zone' only applies to GCP spoke gateways",
                ));
            }
        }

        ValidateResourceConfigResponse { diagnostics }
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

        let config = match self.extract_spoke_config(&request.config) {
            Ok(config) => config,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        if let Err(e) = provider_data.client.create_spoke_gateway(&config.request).await {
            diagnostics.push(Diagnostic::error(
                "Failed to create spoke gateway",
                format!("API error: {}", e),
            ));
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics,
            };
        }

        let cascade = async {
            if config.single_az_ha {
                provider_data
                    .client
                    .enable_single_az_ha(&config.request.gw_name)
                    .await?;
            } else {
                provider_data
                    .client
                    .disable_single_az_ha(&config.request.gw_name)
                    .await?;
            }
            if !config.ha_subnet.is_empty() || !config.ha_zone.is_empty() {
                provider_data
                    .client
                    .enable_spoke_ha(
                        &config.request.gw_name,
                        config.request.cloud_type,
                        &config.ha_subnet,
                        &config.ha_zone,
                        "",
                    )
                    .await?;
            }
            Ok::<(), ApiError>(())
        };
        if let Err(e) = cascade.await {
            diagnostics.push(Diagnostic::error(
                "Failed to apply spoke gateway settings",
                format!(
                    "Gateway {} was created but a follow-up setting failed: {}",
                    config.request.gw_name, e
                ),
            ));
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics,
            };
        }

        match self
            .refresh_state(
                &provider_data.client,
                &config.request.gw_name,
                request.planned_state.clone(),
            )
            .await
        {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read spoke gateway after create",
                    format!("API error: {}", e),
                ));
                CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                }
            }
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = vec![];

        let gw_name = match request
            .current_state
            .get_string(&AttributePath::new("gw_name"))
        {
            Ok(name) => name,
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

        match self
            .refresh_state(
                &provider_data.client,
                &gw_name,
                request.current_state.clone(),
            )
            .await
        {
            Ok(new_state) => ReadResourceResponse {
                new_state: Some(new_state),
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
                    "Failed to read spoke gateway",
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
        let mut diagnostics = vec![];

        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                diagnostics.push(Diagnostic::error(
                    "Provider not configured",
                    "Provider data was not properly configured",
                ));
                return UpdateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        let config = match self.extract_spoke_config(&request.config) {
            Ok(config) => config,
            Err(diag) => {
                diagnostics.push(diag);
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        };

        let apply = async {
            if bool_or(&request.prior_state, "single_az_ha", false) != config.single_az_ha {
                if config.single_az_ha {
                    provider_data
                        .client
                        .enable_single_az_ha(&config.request.gw_name)
                        .await?;
                } else {
                    provider_data
                        .client
                        .disable_single_az_ha(&config.request.gw_name)
                        .await?;
                }
            }

            let prior_ha = !string_or_default(&request.prior_state, "ha_subnet").is_empty()
                || !string_or_default(&request.prior_state, "ha_zone").is_empty();
            let planned_ha = !config.ha_subnet.is_empty() || !config.ha_zone.is_empty();
            if planned_ha && !prior_ha {
                provider_data
                    .client
                    .enable_spoke_ha(
                        &config.request.gw_name,
                        config.request.cloud_type,
                        &config.ha_subnet,
                        &config.ha_zone,
                        "",
                    )
                    .await?;
            } else if !planned_ha && prior_ha {
                provider_data
                    .client
                    .delete_gateway(&format!("{}-hagw", config.request.gw_name))
                    .await?;
            }
            Ok::<(), ApiError>(())
        };
        if let Err(e) = apply.await {
            diagnostics.push(Diagnostic::error(
                "Failed to update spoke gateway",
                format!("API error: {}", e),
            ));
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics,
            };
        }

        match self
            .refresh_state(
                &provider_data.client,
                &config.request.gw_name,
                request.planned_state.clone(),
            )
            .await
        {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read spoke gateway after update",
                    format!("API error: {}", e),
                ));
                UpdateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                }
            }
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

        let gw_name = match request
            .prior_state
            .get_string(&AttributePath::new("gw_name"))
        {
            Ok(name) => name,
            Err(_) => return DeleteResourceResponse { diagnostics },
        };

        let has_ha = !string_or_default(&request.prior_state, "ha_subnet").is_empty()
            || !string_or_default(&request.prior_state, "ha_zone").is_empty();
        if has_ha {
            match provider_data
                .client
                .delete_gateway(&format!("{}-hagw", gw_name))
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    diagnostics.push(Diagnostic::error(
                        "Failed to delete spoke HA gateway",
                        format!("API error: {}", e),
                    ));
                    return DeleteResourceResponse { diagnostics };
                }
            }
        }

        match provider_data.client.delete_gateway(&gw_name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to delete spoke gateway",
                    format!("API error: {}", e),
                ));
            }
        }
        DeleteResourceResponse { diagnostics }
    }

    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        import_state_passthrough_id(&ctx, AttributePath::new("gw_name"), &request, &mut response);
        response
    }
}

#[async_trait]
impl ResourceWithConfigure for SpokeGatewayResource {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(cloud_type: f64) -> DynamicValue {
        let mut config = DynamicValue::empty_object();
        for (name, value) in [
            ("account_name", "acc"),
            ("gw_name", "spoke-1"),
            ("gw_size", "t3.small"),
            ("vpc_id", "vpc-abc"),
            ("vpc_reg", "us-west-2"),
            ("subnet", "10.1.0.0/24"),
        ] {
            config
                .set_string(&AttributePath::new(name), value.to_string())
                .unwrap();
        }
        config
            .set_number(&AttributePath::new("cloud_type"), cloud_type)
            .unwrap();
        config
    }

    #[tokio::test]
    async fn validate_rejects_ha_zone_outside_gcp() {
        let mut config = base_config(1.0);
        config
            .set_string(&AttributePath::new("ha_zone"), "us-west1-b".to_string())
            .unwrap();

        let resource = SpokeGatewayResource::new();
        let response = resource
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "aviatrix_spoke_gateway".to_string(),
                    config,
                },
            )
            .await;
        assert!(response.diagnostics[0].summary.contains("Invalid ha_zone"));
    }

    #[tokio::test]
    async fn validate_rejects_ha_subnet_on_gcp() {
        let mut config = base_config(4.0);
        config
            .set_string(&AttributePath::new("ha_subnet"), "10.1.1.0/24".to_string())
            .unwrap();

        let resource = SpokeGatewayResource::new();
        let response = resource
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "aviatrix_spoke_gateway".to_string(),
                    config,
                },
            )
            .await;
        assert!(response.diagnostics[0].summary.contains("Invalid ha_subnet"));
    }

    #[test]
    fn extract_spoke_config_requires_subnet() {
        let mut config = base_config(1.0);
        config.set_null(&AttributePath::new("subnet")).unwrap();

        let resource = SpokeGatewayResource::new();
        let err = resource.extract_spoke_config(&config).unwrap_err();
        assert!(err.summary.contains("Missing subnet"));
    }
}
