//! Transit gateway to external device (BGP or static) connection resource

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
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
use tfplug::validator::StringInSliceValidator;

use crate::api::{ApiError, Client, ExternalDeviceConnRequest};
use crate::resources::util::{bool_or, number_or, string_or_default};

#[derive(Default)]
pub struct ExternalDeviceConnResource {
    provider_data: Option<crate::AviatrixProviderData>,
}

impl ExternalDeviceConnResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn extract_conn_config(
        &self,
        config: &DynamicValue,
    ) -> Result<ExternalDeviceConnRequest, Diagnostic> {
        let vpc_id = config
            .get_string(&AttributePath::new("vpc_id"))
            .map_err(|_| {
                Diagnostic::error("Missing vpc_id", "The 'vpc_id' attribute is required")
            })?;
        let connection_name = config
            .get_string(&AttributePath::new("connection_name"))
            .map_err(|_| {
                Diagnostic::error(
                    "Missing connection_name",
                    "The 'connection_name' attribute is required",
                )
            })?;
        let gw_name = config
            .get_string(&AttributePath::new("gw_name"))
            .map_err(|_| {
                Diagnostic::error("Missing gw_name", "The 'gw_name' attribute is required")
            })?;
        let remote_gateway_ip = config
            .get_string(&AttributePath::new("remote_gateway_ip"))
            .map_err(|_| {
                Diagnostic::error(
                    "Missing remote_gateway_ip",
                    "The 'remote_gateway_ip' attribute is required",
                )
            })?;

        let mut request = ExternalDeviceConnRequest {
            vpc_id,
            connection_name,
            gw_name,
            remote_gateway_ip,
            routing_protocol: string_or_default(config, "connection_type"),
            bgp_local_as_number: number_or(config, "bgp_local_as_num", 0),
            bgp_remote_as_number: number_or(config, "bgp_remote_as_num", 0),
            remote_subnet: string_or_default(config, "remote_subnet"),
            direct_connect: bool_or(config, "direct_connect", false),
            pre_shared_key: string_or_default(config, "pre_shared_key"),
            local_tunnel_cidr: string_or_default(config, "local_tunnel_cidr"),
            remote_tunnel_cidr: string_or_default(config, "remote_tunnel_cidr"),
            enable_ha: bool_or(config, "enable_ha", false),
            ..Default::default()
        };
        if request.routing_protocol.is_empty() {
            request.routing_protocol = "bgp".to_string();
        }
        if bool_or(config, "custom_algorithms", false) {
            request.phase1_authentication = string_or_default(config, "phase_1_authentication");
            request.phase1_dh_groups = string_or_default(config, "phase_1_dh_groups");
            request.phase1_encryption = string_or_default(config, "phase_1_encryption");
            request.phase2_authentication = string_or_default(config, "phase_2_authentication");
            request.phase2_dh_groups = string_or_default(config, "phase_2_dh_groups");
            request.phase2_encryption = string_or_default(config, "phase_2_encryption");
        }
        Ok(request)
    }

    async fn refresh_state(
        &self,
        client: &Client,
        vpc_id: &str,
        connection_name: &str,
        mut state: DynamicValue,
    ) -> Result<DynamicValue, ApiError> {
        let detail = client
            .get_external_device_conn(vpc_id, connection_name)
            .await?;

        let _ = state.set_string(&AttributePath::new("vpc_id"), vpc_id.to_string());
        let _ = state.set_string(
            &AttributePath::new("connection_name"),
            connection_name.to_string(),
        );
        let _ = state.set_string(&AttributePath::new("gw_name"), detail.gw_name);
        let _ = state.set_string(
            &AttributePath::new("connection_type"),
            detail.routing_protocol.clone(),
        );
        if !detail.remote_gateway_ip.is_empty() {
            let _ = state.set_string(
                &AttributePath::new("remote_gateway_ip"),
                detail.remote_gateway_ip,
            );
        }
        let _ = state.set_bool(&AttributePath::new("enable_ha"), detail.ha_enabled);

        if detail.routing_protocol == "bgp" {
            if let Ok(asn) = detail.bgp_local_as_number.parse::<f64>() {
                let _ = state.set_number(&AttributePath::new("bgp_local_as_num"), asn);
            }
            if let Ok(asn) = detail.bgp_remote_as_number.parse::<f64>() {
                let _ = state.set_number(&AttributePath::new("bgp_remote_as_num"), asn);
            }
            let _ = state.set_null(&AttributePath::new("remote_subnet"));
        } else if !detail.remote_subnet.is_empty() {
            let _ = state.set_string(&AttributePath::new("remote_subnet"), detail.remote_subnet);
        }

        // Controller-default IPSec algorithms are not written back so a
        // config without custom_algorithms stays clean.
        let _ = state.set_bool(
            &AttributePath::new("custom_algorithms"),
            detail.custom_algorithms,
        );
        if detail.custom_algorithms {
            let _ = state.set_string(
                &AttributePath::new("phase_1_authentication"),
                detail.phase1_authentication,
            );
            let _ = state.set_string(
                &AttributePath::new("phase_1_dh_groups"),
                detail.phase1_dh_groups,
            );
            let _ = state.set_string(
                &AttributePath::new("phase_1_encryption"),
                detail.phase1_encryption,
            );
            let _ = state.set_string(
                &AttributePath::new("phase_2_authentication"),
                detail.phase2_authentication,
            );
            let _ = state.set_string(
                &AttributePath::new("phase_2_dh_groups"),
                detail.phase2_dh_groups,
            );
            let _ = state.set_string(
                &AttributePath::new("phase_2_encryption"),
                detail.phase2_encryption,
            );
        }

        Ok(state)
    }
}

#[async_trait]
impl Resource for ExternalDeviceConnResource {
    fn type_name(&self) -> &str {
        "aviatrix_transit_external_device_conn"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description(
                "Manages a connection from an Aviatrix transit gateway to an external device",
            )
            .attribute(
                AttributeBuilder::new("vpc_id", AttributeType::String)
                    .description("VPC of the transit gateway")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("connection_name", AttributeType::String)
                    .description("Name of the connection")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("gw_name", AttributeType::String)
                    .description("Transit gateway the connection originates from")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("remote_gateway_ip", AttributeType::String)
                    .description("Public IP of the external device")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("connection_type", AttributeType::String)
                    .description("Routing protocol of the connection: 'bgp' or 'static'")
                    .optional()
                    .computed()
                    .default(StaticDefault::string("bgp"))
                    .validator(StringInSliceValidator::create(&["bgp", "static"]))
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("bgp_local_as_num", AttributeType::Number)
                    .description("BGP AS number of the transit gateway")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("bgp_remote_as_num", AttributeType::Number)
                    .description("BGP AS number of the external device")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("remote_subnet", AttributeType::String)
                    .description("Remote CIDRs, comma separated (static connections only)")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("direct_connect", AttributeType::Bool)
                    .description("Connect over private networking instead of the internet")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("pre_shared_key", AttributeType::String)
                    .description("IPSec pre-shared key")
                    .optional()
                    .sensitive()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("local_tunnel_cidr", AttributeType::String)
                    .description("Local tunnel interface CIDRs, comma separated")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("remote_tunnel_cidr", AttributeType::String)
                    .description("Remote tunnel interface CIDRs, comma separated")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("custom_algorithms", AttributeType::Bool)
                    .description("Use the phase 1/phase 2 algorithms below instead of defaults")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("phase_1_authentication", AttributeType::String)
                    .description("Phase 1 authentication algorithm")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("phase_1_dh_groups", AttributeType::String)
                    .description("Phase 1 Diffie-Hellman group")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("phase_1_encryption", AttributeType::String)
                    .description("Phase 1 encryption algorithm")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("phase_2_authentication", AttributeType::String)
                    .description("Phase 2 authentication algorithm")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("phase_2_dh_groups", AttributeType::String)
                    .description("Phase 2 Diffie-Hellman group")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("phase_2_encryption", AttributeType::String)
                    .description("Phase 2 encryption algorithm")
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enable_ha", AttributeType::Bool)
                    .description("Build a backup tunnel from the HA transit gateway")
                    .optional()
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
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];

        let connection_type = {
            let configured = string_or_default(&request.config, "connection_type");
            if configured.is_empty() {
                "bgp".to_string()
            } else {
                configured
            }
        };
        let has_local_asn = number_or(&request.config, "bgp_local_as_num", 0) != 0;
        let has_remote_asn = number_or(&request.config, "bgp_remote_as_num", 0) != 0;
        let has_remote_subnet = !string_or_default(&request.config, "remote_subnet").is_empty();

        if connection_type == "bgp" {
            if !has_local_asn || !has_remote_asn {
                diagnostics.push(Diagnostic::error(
                    "Missing BGP AS numbers",
                    "'bgp_local_as_num' and 'bgp_remote_as_num' are required for BGP connections",
                ));
            }
            if has_remote_subnet {
                diagnostics.push(Diagnostic::error(
                    "Invalid remote_subnet",
                    "'remote_subnet' only applies to static connections",
                ));
            }
        } else if !has_remote_subnet {
            diagnostics.push(Diagnostic::error(
                "Missing remote_subnet",
                "'remote_subnet' is required for static connections",
            ));
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

        let conn = match self.extract_conn_config(&request.config) {
            Ok(conn) => conn,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        if let Err(e) = provider_data.client.create_external_device_conn(&conn).await {
            diagnostics.push(Diagnostic::error(
                "Failed to create external device connection",
                format!("API error: {}", e),
            ));
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics,
            };
        }

        match self
            .refresh_state(
                &provider_data.client,
                &conn.vpc_id,
                &conn.connection_name,
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
                    "Failed to read connection after create",
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

        let vpc_id = string_or_default(&request.current_state, "vpc_id");
        let connection_name = string_or_default(&request.current_state, "connection_name");
        if vpc_id.is_empty() || connection_name.is_empty() {
            return ReadResourceResponse {
                new_state: None,
                diagnostics,
                private: request.private,
            };
        }

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
                &vpc_id,
                &connection_name,
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
                    "Failed to read external device connection",
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
        // Every attribute forces replacement, so nothing is updatable in place.
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

        let vpc_id = string_or_default(&request.prior_state, "vpc_id");
        let connection_name = string_or_default(&request.prior_state, "connection_name");
        if vpc_id.is_empty() || connection_name.is_empty() {
            return DeleteResourceResponse { diagnostics };
        }

        match provider_data
            .client
            .delete_external_device_conn(&vpc_id, &connection_name)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to delete external device connection",
                    format!("API error: {}", e),
                ));
            }
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
                    "Expected import ID in the form 'vpc_id~connection_name', got '{}'",
                    request.id
                ),
            ));
            return response;
        }

        let mut state = DynamicValue::empty_object();
        let _ = state.set_string(&AttributePath::new("vpc_id"), parts[0].to_string());
        let _ = state.set_string(
            &AttributePath::new("connection_name"),
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
impl ResourceWithConfigure for ExternalDeviceConnResource {
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

    fn base_config(connection_type: &str) -> DynamicValue {
        let mut config = DynamicValue::empty_object();
        for (name, value) in [
            ("vpc_id", "vpc-abc"),
            ("connection_name", "conn-1"),
            ("gw_name", "transit-1"),
            ("remote_gateway_ip", "203.0.113.10"),
            ("connection_type", connection_type),
        ] {
            config
                .set_string(&AttributePath::new(name), value.to_string())
                .unwrap();
        }
        config
    }

    #[tokio::test]
    async fn validate_requires_as_numbers_for_bgp() {
        let resource = ExternalDeviceConnResource::new();
        let response = resource
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "aviatrix_transit_external_device_conn".to_string(),
                    config: base_config("bgp"),
                },
            )
            .await;
        assert!(response.diagnostics[0]
            .summary
            .contains("Missing BGP AS numbers"));
    }

    #[tokio::test]
    async fn validate_rejects_remote_subnet_for_bgp() {
        let mut config = base_config("bgp");
        config
            .set_number(&AttributePath::new("bgp_local_as_num"), 65001.0)
            .unwrap();
        config
            .set_number(&AttributePath::new("bgp_remote_as_num"), 65002.0)
            .unwrap();
        config
            .set_string(&AttributePath::new("remote_subnet"), "10.9.0.0/16".to_string())
            .unwrap();

        let resource = ExternalDeviceConnResource::new();
        let response = resource
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "aviatrix_transit_external_device_conn".to_string(),
                    config,
                },
            )
            .await;
        assert!(response.diagnostics[0]
            .summary
            .contains("Invalid remote_subnet"));
    }

    #[tokio::test]
    async fn validate_requires_remote_subnet_for_static() {
        let resource = ExternalDeviceConnResource::new();
        let response = resource
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "aviatrix_transit_external_device_conn".to_string(),
                    config: base_config("static"),
                },
            )
            .await;
        assert!(response.diagnostics[0]
            .summary
            .contains("Missing remote_subnet"));
    }

    #[test]
    fn extract_conn_config_defaults_to_bgp() {
        let mut config = base_config("bgp");
        config
            .set_null(&AttributePath::new("connection_type"))
            .unwrap();
        config
            .set_number(&AttributePath::new("bgp_local_as_num"), 65001.0)
            .unwrap();
        config
            .set_number(&AttributePath::new("bgp_remote_as_num"), 65002.0)
            .unwrap();

        let resource = ExternalDeviceConnResource::new();
        let conn = resource.extract_conn_config(&config).unwrap();
        assert_eq!(conn.routing_protocol, "bgp");
        assert_eq!(conn.bgp_local_as_number, 65001);
    }

    #[test]
    fn extract_conn_config_ignores_algorithms_without_custom_flag() {
        let mut config = base_config("bgp");
        config
            .set_string(
                &AttributePath::new("phase_1_authentication"),
                "SHA-1".to_string(),
            )
            .unwrap();

        let resource = ExternalDeviceConnResource::new();
        let conn = resource.extract_conn_config(&config).unwrap();
        assert!(conn.phase1_authentication.is_empty());
    }
}
