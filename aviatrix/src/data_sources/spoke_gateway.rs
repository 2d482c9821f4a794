//! Spoke gateway data source

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic};

#[derive(Default)]
pub struct SpokeGatewayDataSource {
    provider_data: Option<crate::AviatrixProviderData>,
}

impl SpokeGatewayDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for SpokeGatewayDataSource {
    fn type_name(&self) -> &str {
        "aviatrix_spoke_gateway"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Looks up an Aviatrix spoke gateway by name")
            .attribute(
                AttributeBuilder::new("gw_name", AttributeType::String)
                    .description("Name of the spoke gateway")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("account_name", AttributeType::String)
                    .description("Access account the gateway belongs to")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("cloud_type", AttributeType::Number)
                    .description("Cloud provider ID")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("gw_size", AttributeType::String)
                    .description("Instance size of the gateway")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vpc_id", AttributeType::String)
                    .description("VPC the gateway runs in")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vpc_reg", AttributeType::String)
                    .description("Region of the VPC")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("subnet", AttributeType::String)
                    .description("Subnet the gateway runs in")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("public_ip", AttributeType::String)
                    .description("Public IP of the gateway")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("private_ip", AttributeType::String)
                    .description("Private IP of the gateway")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("insane_mode", AttributeType::Bool)
                    .description("Whether high-performance encryption is enabled")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "transit_gw",
                    AttributeType::List(Box::new(AttributeType::String)),
                )
                .description("Transit gateways this spoke is attached to")
                .computed()
                .build(),
            )
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let mut diagnostics = vec![];
        let mut state = request.config.clone();

        let gw_name = match request.config.get_string(&AttributePath::new("gw_name")) {
            Ok(name) => name,
            Err(_) => {
                diagnostics.push(Diagnostic::error(
                    "Missing gw_name",
                    "The 'gw_name' attribute is required",
                ));
                return ReadDataSourceResponse { state, diagnostics };
            }
        };

        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                diagnostics.push(Diagnostic::error(
                    "Provider not configured",
                    "Provider data was not properly configured",
                ));
                return ReadDataSourceResponse { state, diagnostics };
            }
        };

        match provider_data.client.get_gateway_info(&gw_name).await {
            Ok(detail) => {
                let _ = state.set_string(&AttributePath::new("account_name"), detail.account_name);
                let _ = state.set_number(
                    &AttributePath::new("cloud_type"),
                    detail.cloud_type as f64,
                );
                let _ = state.set_string(&AttributePath::new("gw_size"), detail.gw_size);
                let _ = state.set_string(&AttributePath::new("vpc_id"), detail.vpc_id);
                let _ = state.set_string(&AttributePath::new("vpc_reg"), detail.vpc_region);
                let _ = state.set_string(&AttributePath::new("subnet"), detail.subnet);
                let _ = state.set_string(&AttributePath::new("public_ip"), detail.public_ip);
                let _ = state.set_string(&AttributePath::new("private_ip"), detail.private_ip);
                let _ = state.set_bool(
                    &AttributePath::new("insane_mode"),
                    detail.insane_mode == "yes",
                );
                let transits: Vec<Dynamic> = detail
                    .transit_gw_name
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(|name| Dynamic::String(name.to_string()))
                    .collect();
                let _ = state.set_list(&AttributePath::new("transit_gw"), transits);
            }
            Err(e) if e.is_not_found() => {
                diagnostics.push(Diagnostic::error(
                    "Spoke gateway not found",
                    format!("No gateway named '{}' exists", gw_name),
                ));
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read spoke gateway",
                    format!("API error: {}", e),
                ));
            }
        }

        ReadDataSourceResponse { state, diagnostics }
    }
}

#[async_trait]
impl DataSourceWithConfigure for SpokeGatewayDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
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
                "No provider data was provided to the data source",
            ));
        }

        ConfigureDataSourceResponse { diagnostics }
    }
}
