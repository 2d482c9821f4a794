//! Access account data source

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic};

#[derive(Default)]
pub struct AccountDataSource {
    provider_data: Option<crate::AviatrixProviderData>,
}

impl AccountDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for AccountDataSource {
    fn type_name(&self) -> &str {
        "aviatrix_account"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Looks up an Aviatrix access account by name")
            .attribute(
                AttributeBuilder::new("account_name", AttributeType::String)
                    .description("Name of the access account")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("cloud_type", AttributeType::Number)
                    .description("Cloud provider ID of the account")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("aws_account_number", AttributeType::String)
                    .description("AWS account number (AWS accounts)")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("gcloud_project_name", AttributeType::String)
                    .description("GCP project ID (GCP accounts)")
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

        let account_name = match request
            .config
            .get_string(&AttributePath::new("account_name"))
        {
            Ok(name) => name,
            Err(_) => {
                diagnostics.push(Diagnostic::error(
                    "Missing account_name",
                    "The 'account_name' attribute is required",
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

        match provider_data.client.get_account(&account_name).await {
            Ok(account) => {
                let _ = state.set_number(
                    &AttributePath::new("cloud_type"),
                    account.cloud_type as f64,
                );
                let _ = state.set_string(
                    &AttributePath::new("aws_account_number"),
                    account.aws_account_number,
                );
                let _ = state.set_string(
                    &AttributePath::new("gcloud_project_name"),
                    account.gcloud_project_name,
                );
            }
            Err(e) if e.is_not_found() => {
                diagnostics.push(Diagnostic::error(
                    "Account not found",
                    format!("No access account named '{}' exists", account_name),
                ));
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read account",
                    format!("API error: {}", e),
                ));
            }
        }

        ReadDataSourceResponse { state, diagnostics }
    }
}

#[async_trait]
impl DataSourceWithConfigure for AccountDataSource {
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

#[cfg(test)]
mod tests {
    use super::*;
    use tfplug::types::DynamicValue;

    #[tokio::test]
    async fn read_without_provider_data_fails() {
        let mut config = DynamicValue::empty_object();
        config
            .set_string(&AttributePath::new("account_name"), "acc".to_string())
            .unwrap();

        let data_source = AccountDataSource::new();
        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "aviatrix_account".to_string(),
                    config,
                },
            )
            .await;
        assert!(response.diagnostics[0]
            .summary
            .contains("Provider not configured"));
    }
}
