//! Transit gateway resource
//!
//! Create launches the primary gateway and then walks the post-create
//! cascade: single-AZ HA, HA peer, learned-CIDR approval and the BGP
//! settings, each through its own controller action. Update re-issues only
//! the actions whose attributes actually changed.

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
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::api::{ApiError, Client, TransitGatewayRequest, CLOUD_TYPE_GCP};
use crate::resources::util::{bool_or, number_or, string_list, string_or_default};

const DEFAULT_BGP_POLLING_TIME: i64 = 50;
const DEFAULT_BGP_HOLD_TIME: i64 = 180;

#[derive(Default)]
pub struct TransitGatewayResource {
    provider_data: Option<crate::AviatrixProviderData>,
}

/// Full configuration, launch request plus the cascade settings.
struct TransitConfig {
    request: TransitGatewayRequest,
    single_az_ha: bool,
    ha_subnet: String,
    ha_zone: String,
    bgp_polling_time: i64,
    bgp_hold_time: i64,
    local_as_number: String,
    prepend_as_path: Vec<String>,
    bgp_ecmp: bool,
    learned_cidrs_approval: bool,
}

impl TransitGatewayResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn extract_transit_config(&self, config: &DynamicValue) -> Result<TransitConfig, Diagnostic> {
        let request = TransitGatewayRequest {
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
            connected_transit: bool_or(config, "connected_transit", false),
            zone: string_or_default(config, "zone"),
            eip: string_or_default(config, "eip"),
        };

        Ok(TransitConfig {
            request,
            single_az_ha: bool_or(config, "single_az_ha", false),
            ha_subnet: string_or_default(config, "ha_subnet"),
            ha_zone: string_or_default(config, "ha_zone"),
            bgp_polling_time: number_or(config, "bgp_polling_time", DEFAULT_BGP_POLLING_TIME),
            bgp_hold_time: number_or(config, "bgp_hold_time", DEFAULT_BGP_HOLD_TIME),
            local_as_number: string_or_default(config, "local_as_number"),
            prepend_as_path: string_list(config, "prepend_as_path"),
            bgp_ecmp: bool_or(config, "bgp_ecmp", false),
            learned_cidrs_approval: bool_or(config, "enable_learned_cidrs_approval", false),
        })
    }

    /// Refreshes gateway attributes from the controller into `state`.
    async fn refresh_state(
        &self,
        client: &Client,
        gw_name: &str,
        mut state: DynamicValue,
    ) -> Result<DynamicValue, ApiError> {
        let detail = client.get_gateway_info(gw_name).await?;
        let advanced = client.get_transit_advanced_config(gw_name).await?;

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
            &AttributePath::new("connected_transit"),
            detail.connected_transit == "yes",
        );
        let _ = state.set_bool(
            &AttributePath::new("insane_mode"),
            detail.insane_mode == "yes",
        );
        if !detail.zone.is_empty() {
            let _ = state.set_string(&AttributePath::new("zone"), detail.zone.clone());
        }

        match detail.ha_gateway() {
            // GCP places the HA peer by zone; ha_zone stays as configured.
            Some(ha) if detail.cloud_type != CLOUD_TYPE_GCP => {
                let _ = state.set_string(&AttributePath::new("ha_subnet"), ha.subnet.clone());
            }
            Some(_) => {}
            None => {
                let _ = state.set_null(&AttributePath::new("ha_subnet"));
                let _ = state.set_null(&AttributePath::new("ha_zone"));
            }
        }

        let _ = state.set_number(
            &AttributePath::new("bgp_polling_time"),
            advanced.bgp_polling_time as f64,
        );
        let _ = state.set_number(
            &AttributePath::new("bgp_hold_time"),
            advanced.bgp_hold_time as f64,
        );
        let _ = state.set_bool(&AttributePath::new("bgp_ecmp"), advanced.bgp_ecmp);
        let _ = state.set_bool(
            &AttributePath::new("enable_learned_cidrs_approval"),
            advanced.learned_cidrs_approval,
        );
        if advanced.local_as_number.is_empty() {
            let _ = state.set_null(&AttributePath::new("local_as_number"));
        } else {
            let _ = state.set_string(
                &AttributePath::new("local_as_number"),
                advanced.local_as_number,
            );
        }
        if advanced.prepend_as_path.is_empty() {
            let _ = state.set_null(&AttributePath::new("prepend_as_path"));
        } else {
            let _ = state.set_list(
                &AttributePath::new("prepend_as_path"),
                advanced
                    .prepend_as_path
                    .into_iter()
                    .map(Dynamic::String)
                    .collect(),
            );
        }

        Ok(state)
    }

    /// The post-launch controller calls for settings `create_multicloud_
    /// primary_gateway` cannot express.
    async fn apply_create_cascade(
        &self,
        client: &Client,
        config: &TransitConfig,
    ) -> Result<(), ApiError> {
        let gw_name = &config.request.gw_name;

        if config.single_az_ha {
            client.enable_single_az_ha(gw_name).await?;
        } else {
            client.disable_single_az_ha(gw_name).await?;
        }
        if !config.ha_subnet.is_empty() || !config.ha_zone.is_empty() {
            client
                .enable_transit_ha(
                    gw_name,
                    config.request.cloud_type,
                    &config.ha_subnet,
                    &config.ha_zone,
                    "",
                )
                .await?;
        }
        if config.learned_cidrs_approval {
            client.enable_learned_cidrs_approval(gw_name).await?;
        }
        if config.bgp_polling_time != DEFAULT_BGP_POLLING_TIME {
            client
                .set_bgp_polling_time(gw_name, config.bgp_polling_time)
                .await?;
        }
        if !config.local_as_number.is_empty() {
            client
                .set_local_as_number(gw_name, &config.local_as_number)
                .await?;
        }
        if !config.prepend_as_path.is_empty() {
            client
                .set_prepend_as_path(gw_name, &config.prepend_as_path)
                .await?;
        }
        if config.bgp_ecmp {
            client.enable_bgp_ecmp(gw_name).await?;
        }
        if config.bgp_hold_time != DEFAULT_BGP_HOLD_TIME {
            client
                .set_bgp_hold_time(gw_name, config.bgp_hold_time)
                .await?;
        }
        Ok(())
    }

    async fn apply_update(
        &self,
        client: &Client,
        prior: &DynamicValue,
        config: &TransitConfig,
    ) -> Result<(), ApiError> {
        let gw_name = &config.request.gw_name;

        if bool_or(prior, "single_az_ha", false) != config.single_az_ha {
            if config.single_az_ha {
                client.enable_single_az_ha(gw_name).await?;
            } else {
                client.disable_single_az_ha(gw_name).await?;
            }
        }

        if bool_or(prior, "connected_transit", false) != config.request.connected_transit {
            if config.request.connected_transit {
                client.enable_connected_transit(gw_name).await?;
            } else {
                client.disable_connected_transit(gw_name).await?;
            }
        }

        let prior_ha =
            !string_or_default(prior, "ha_subnet").is_empty()
                || !string_or_default(prior, "ha_zone").is_empty();
        let planned_ha = !config.ha_subnet.is_empty() || !config.ha_zone.is_empty();
        if planned_ha && !prior_ha {
            client
                .enable_transit_ha(
                    gw_name,
                    config.request.cloud_type,
                    &config.ha_subnet,
                    &config.ha_zone,
                    "",
                )
                .await?;
        } else if !planned_ha && prior_ha {
            client.delete_gateway(&format!("{}-hagw", gw_name)).await?;
        }

        if number_or(prior, "bgp_polling_time", DEFAULT_BGP_POLLING_TIME)
            != config.bgp_polling_time
        {
            client
                .set_bgp_polling_time(gw_name, config.bgp_polling_time)
                .await?;
        }
        if string_or_default(prior, "local_as_number") != config.local_as_number
            && !config.local_as_number.is_empty()
        {
            client
                .set_local_as_number(gw_name, &config.local_as_number)
                .await?;
        }
        if string_list(prior, "prepend_as_path") != config.prepend_as_path {
            client
                .set_prepend_as_path(gw_name, &config.prepend_as_path)
                .await?;
        }
        if bool_or(prior, "bgp_ecmp", false) != config.bgp_ecmp {
            if config.bgp_ecmp {
                client.enable_bgp_ecmp(gw_name).await?;
            } else {
                client.disable_bgp_ecmp(gw_name).await?;
            }
        }
        if bool_or(prior, "enable_learned_cidrs_approval", false)
            != config.learned_cidrs_approval
        {
            if config.learned_cidrs_approval {
                client.enable_learned_cidrs_approval(gw_name).await?;
            } else {
                client.disable_learned_cidrs_approval(gw_name).await?;
            }
        }
        if number_or(prior, "bgp_hold_time", DEFAULT_BGP_HOLD_TIME) != config.bgp_hold_time {
            client
                .set_bgp_hold_time(gw_name, config.bgp_hold_time)
                .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl Resource for TransitGatewayResource {
    fn type_name(&self) -> &str {
        "aviatrix_transit_gateway"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages an Aviatrix transit gateway")
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
                    .description("Name of the transit gateway")
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
                AttributeBuilder::new("connected_transit", AttributeType::Bool)
                    .description("Allow spoke-to-spoke traffic through this transit")
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
                AttributeBuilder::new("bgp_polling_time", AttributeType::Number)
                    .description("BGP route polling interval in seconds (10-50)")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("bgp_hold_time", AttributeType::Number)
                    .description("BGP hold time in seconds (12-360)")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("local_as_number", AttributeType::String)
                    .description("Local AS number for BGP")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("prepend_as_path", AttributeType::List(Box::new(
                    AttributeType::String,
                )))
                    .description("AS numbers prepended to announcements. Requires local_as_number")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("bgp_ecmp", AttributeType::Bool)
                    .description("Equal-cost multi-path routing over BGP")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enable_learned_cidrs_approval", AttributeType::Bool)
                    .description("Require approval of BGP-learned CIDRs")
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

        let prepend = string_list(&request.config, "prepend_as_path");
        if !prepend.is_empty()
            && string_or_default(&request.config, "local_as_number").is_empty()
        {
            diagnostics.push(Diagnostic::error(
                "Missing local_as_number",
                "'prepend_as_path' requires 'local_as_number' to be set",
            ));
        }

        let polling = number_or(&request.config, "bgp_polling_time", DEFAULT_BGP_POLLING_TIME);
        if !(10..=50).contains(&polling) {
            diagnostics.push(Diagnostic::error(
                "Invalid bgp_polling_time",
                format!("bgp_polling_time must be between 10 and 50 seconds, got {}", polling),
            ));
        }

        let hold = number_or(&request.config, "bgp_hold_time", DEFAULT_BGP_HOLD_TIME);
        if !(12..=360).contains(&hold) {
            diagnostics.push(Diagnostic::error(
                "Invalid bgp_hold_time",
                format!("bgp_hold_time must be between 12 and 360 seconds, got {}", hold),
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

        let config = match self.extract_transit_config(&request.config) {
            Ok(config) => config,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        if let Err(e) = provider_data.client.create_transit_gateway(&config.request).await {
            diagnostics.push(Diagnostic::error(
                "Failed to create transit gateway",
                format!("API error: {}", e),
            ));
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics,
            };
        }

        if let Err(e) = self
            .apply_create_cascade(&provider_data.client, &config)
            .await
        {
            diagnostics.push(Diagnostic::error(
                "Failed to apply transit gateway settings",
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
                    "Failed to read transit gateway after create",
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
                    "Failed to read transit gateway",
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

        let config = match self.extract_transit_config(&request.config) {
            Ok(config) => config,
            Err(diag) => {
                diagnostics.push(diag);
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        };

        if let Err(e) = self
            .apply_update(&provider_data.client, &request.prior_state, &config)
            .await
        {
            diagnostics.push(Diagnostic::error(
                "Failed to update transit gateway",
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
                    "Failed to read transit gateway after update",
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

        // The HA peer must go first or the primary delete is rejected.
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
                        "Failed to delete transit HA gateway",
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
                    "Failed to delete transit gateway",
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
impl ResourceWithConfigure for TransitGatewayResource {
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

    fn base_config() -> DynamicValue {
        let mut config = DynamicValue::empty_object();
        for (name, value) in [
            ("account_name", "acc"),
            ("gw_name", "transit-1"),
            ("gw_size", "t3.medium"),
            ("vpc_id", "vpc-abc"),
            ("vpc_reg", "us-west-2"),
            ("subnet", "10.0.0.0/24"),
        ] {
            config
                .set_string(&AttributePath::new(name), value.to_string())
                .unwrap();
        }
        config
            .set_number(&AttributePath::new("cloud_type"), 1.0)
            .unwrap();
        config
    }

    #[tokio::test]
    async fn validate_requires_local_as_number_for_prepend_path() {
        let mut config = base_config();
        config
            .set_list(
                &AttributePath::new("prepend_as_path"),
                vec![Dynamic::String("65001".to_string())],
            )
            .unwrap();

        let resource = TransitGatewayResource::new();
        let response = resource
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "aviatrix_transit_gateway".to_string(),
                    config,
                },
            )
            .await;
        assert!(response.diagnostics[0]
            .summary
            .contains("Missing local_as_number"));
    }

    #[tokio::test]
    async fn validate_rejects_out_of_range_bgp_timers() {
        let mut config = base_config();
        config
            .set_number(&AttributePath::new("bgp_polling_time"), 5.0)
            .unwrap();
        config
            .set_number(&AttributePath::new("bgp_hold_time"), 1000.0)
            .unwrap();

        let resource = TransitGatewayResource::new();
        let response = resource
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "aviatrix_transit_gateway".to_string(),
                    config,
                },
            )
            .await;
        assert_eq!(response.diagnostics.len(), 2);
    }

    #[test]
    fn extract_transit_config_applies_bgp_defaults() {
        let resource = TransitGatewayResource::new();
        let config = resource.extract_transit_config(&base_config()).unwrap();
        assert_eq!(config.bgp_polling_time, DEFAULT_BGP_POLLING_TIME);
        assert_eq!(config.bgp_hold_time, DEFAULT_BGP_HOLD_TIME);
        assert!(!config.request.connected_transit);
        assert!(config.prepend_as_path.is_empty());
    }

    #[tokio::test]
    async fn read_without_gateway_name_removes_state() {
        let resource = TransitGatewayResource::new();
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "aviatrix_transit_gateway".to_string(),
                    current_state: DynamicValue::empty_object(),
                    private: vec![],
                },
            )
            .await;
        assert!(response.new_state.is_none());
    }
}
