//! Terraform provider for the Aviatrix controller.

pub mod api;
pub mod data_sources;
pub mod resources;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderSchemaRequest, ProviderSchemaResponse, ResourceFactory,
    ValidateProviderConfigRequest, ValidateProviderConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

/// Shared state handed to every resource and data source.
#[derive(Clone)]
pub struct AviatrixProviderData {
    pub client: api::Client,
}

pub struct AviatrixProvider;

impl AviatrixProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AviatrixProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn config_or_env(config: &DynamicValue, attr: &str, env_var: &str) -> Option<String> {
    config
        .get_string(&AttributePath::new(attr))
        .ok()
        .filter(|value| !value.is_empty())
        .or_else(|| std::env::var(env_var).ok())
}

#[async_trait]
impl Provider for AviatrixProvider {
    fn type_name(&self) -> &str {
        "aviatrix"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ProviderSchemaRequest,
    ) -> ProviderSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Interact with an Aviatrix controller")
            .attribute(
                AttributeBuilder::new("controller_ip", AttributeType::String)
                    .description("Aviatrix controller IP or hostname")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("username", AttributeType::String)
                    .description("Aviatrix controller username")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("password", AttributeType::String)
                    .description("Aviatrix controller password")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("skip_version_validation", AttributeType::Bool)
                    .description("Skip the controller version compatibility check")
                    .optional()
                    .build(),
            )
            .build();

        ProviderSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse {
        // Missing credentials are diagnosed in configure, after env-var
        // fallback has been applied.
        ValidateProviderConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let mut diagnostics = vec![];

        let controller_ip =
            config_or_env(&request.config, "controller_ip", "AVIATRIX_CONTROLLER_IP");
        let username = config_or_env(&request.config, "username", "AVIATRIX_USERNAME");
        let password = config_or_env(&request.config, "password", "AVIATRIX_PASSWORD");

        let (controller_ip, username, password) = match (controller_ip, username, password) {
            (Some(ip), Some(user), Some(pass)) => (ip, user, pass),
            (ip, user, _) => {
                let missing = if ip.is_none() {
                    "controller_ip is required (set in provider config or AVIATRIX_CONTROLLER_IP env var)"
                } else if user.is_none() {
                    "username is required (set in provider config or AVIATRIX_USERNAME env var)"
                } else {
                    "password is required (set in provider config or AVIATRIX_PASSWORD env var)"
                };
                diagnostics.push(Diagnostic::error("Missing provider configuration", missing));
                return ConfigureProviderResponse {
                    diagnostics,
                    provider_data: None,
                };
            }
        };

        let skip_version_validation = request
            .config
            .get_bool(&AttributePath::new("skip_version_validation"))
            .unwrap_or(false);
        if skip_version_validation {
            tracing::debug!("controller version validation skipped");
        }

        let client = match api::Client::new(&controller_ip, &username, &password) {
            Ok(client) => client,
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create API client",
                    e.to_string(),
                ));
                return ConfigureProviderResponse {
                    diagnostics,
                    provider_data: None,
                };
            }
        };

        if let Err(e) = client.login().await {
            diagnostics.push(Diagnostic::error(
                "Failed to authenticate with controller",
                e.to_string(),
            ));
            return ConfigureProviderResponse {
                diagnostics,
                provider_data: None,
            };
        }

        ConfigureProviderResponse {
            diagnostics,
            provider_data: Some(Arc::new(AviatrixProviderData { client })),
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
        factories.insert(
            "aviatrix_account".to_string(),
            Box::new(|| Box::new(resources::account::AccountResource::new())),
        );
        factories.insert(
            "aviatrix_transit_gateway".to_string(),
            Box::new(|| Box::new(resources::transit_gateway::TransitGatewayResource::new())),
        );
        factories.insert(
            "aviatrix_spoke_gateway".to_string(),
            Box::new(|| Box::new(resources::spoke_gateway::SpokeGatewayResource::new())),
        );
        factories.insert(
            "aviatrix_spoke_transit_attachment".to_string(),
            Box::new(|| {
                Box::new(resources::spoke_transit_attachment::SpokeTransitAttachmentResource::new())
            }),
        );
        factories.insert(
            "aviatrix_transit_external_device_conn".to_string(),
            Box::new(|| {
                Box::new(resources::external_device_conn::ExternalDeviceConnResource::new())
            }),
        );
        factories.insert(
            "aviatrix_firewall".to_string(),
            Box::new(|| Box::new(resources::firewall::FirewallResource::new())),
        );
        factories.insert(
            "aviatrix_firewall_tag".to_string(),
            Box::new(|| Box::new(resources::firewall_tag::FirewallTagResource::new())),
        );
        factories
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut factories: HashMap<String, DataSourceFactory> = HashMap::new();
        factories.insert(
            "aviatrix_account".to_string(),
            Box::new(|| Box::new(data_sources::account::AccountDataSource::new())),
        );
        factories.insert(
            "aviatrix_transit_gateway".to_string(),
            Box::new(|| Box::new(data_sources::transit_gateway::TransitGatewayDataSource::new())),
        );
        factories.insert(
            "aviatrix_spoke_gateway".to_string(),
            Box::new(|| Box::new(data_sources::spoke_gateway::SpokeGatewayDataSource::new())),
        );
        factories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn empty_config() -> DynamicValue {
        DynamicValue::empty_object()
    }

    #[tokio::test]
    #[serial]
    async fn configure_reports_missing_controller_ip() {
        std::env::remove_var("AVIATRIX_CONTROLLER_IP");
        std::env::remove_var("AVIATRIX_USERNAME");
        std::env::remove_var("AVIATRIX_PASSWORD");

        let mut provider = AviatrixProvider::new();
        let response = provider
            .configure(
                Context::new(),
                ConfigureProviderRequest {
                    terraform_version: "1.9.0".to_string(),
                    config: empty_config(),
                },
            )
            .await;

        assert!(!response.diagnostics.is_empty());
        assert!(response.diagnostics[0].detail.contains("controller_ip"));
        assert!(response.provider_data.is_none());
    }

    #[tokio::test]
    #[serial]
    async fn configure_prefers_config_over_env() {
        std::env::set_var("AVIATRIX_USERNAME", "env-user");

        let mut config = empty_config();
        config
            .set_string(&AttributePath::new("username"), "config-user".to_string())
            .unwrap();
        assert_eq!(
            config_or_env(&config, "username", "AVIATRIX_USERNAME"),
            Some("config-user".to_string())
        );

        std::env::remove_var("AVIATRIX_USERNAME");
    }

    #[tokio::test]
    async fn provider_registers_expected_type_names() {
        let provider = AviatrixProvider::new();
        let resources = provider.resources();
        for name in [
            "aviatrix_account",
            "aviatrix_transit_gateway",
            "aviatrix_spoke_gateway",
            "aviatrix_spoke_transit_attachment",
            "aviatrix_transit_external_device_conn",
            "aviatrix_firewall",
            "aviatrix_firewall_tag",
        ] {
            assert!(resources.contains_key(name), "missing resource {name}");
        }

        let data_sources = provider.data_sources();
        for name in [
            "aviatrix_account",
            "aviatrix_transit_gateway",
            "aviatrix_spoke_gateway",
        ] {
            assert!(data_sources.contains_key(name), "missing data source {name}");
        }
    }
}
