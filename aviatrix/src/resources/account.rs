//! Cloud account resource

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::plan_modifier::RequiresReplace;
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

use crate::api::{AccountRequest, CLOUD_TYPE_AWS, CLOUD_TYPE_GCP};

#[derive(Default)]
pub struct AccountResource {
    provider_data: Option<crate::AviatrixProviderData>,
}

impl AccountResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn extract_account_config(&self, config: &DynamicValue) -> Result<AccountRequest, Diagnostic> {
        let account_name = config
            .get_string(&AttributePath::new("account_name"))
            .map_err(|_| {
                Diagnostic::error(
                    "Missing account_name",
                    "The 'account_name' attribute is required",
                )
            })?;
        let cloud_type = config
            .get_number(&AttributePath::new("cloud_type"))
            .map_err(|_| {
                Diagnostic::error(
                    "Missing cloud_type",
                    "The 'cloud_type' attribute is required",
                )
            })? as i64;

        Ok(AccountRequest {
            account_name,
            cloud_type,
            aws_account_number: config
                .get_string(&AttributePath::new("aws_account_number"))
                .unwrap_or_default(),
            aws_iam: config
                .get_bool(&AttributePath::new("aws_iam"))
                .unwrap_or(false),
            aws_access_key: config
                .get_string(&AttributePath::new("aws_access_key"))
                .unwrap_or_default(),
            aws_secret_key: config
                .get_string(&AttributePath::new("aws_secret_key"))
                .unwrap_or_default(),
            gcloud_project_name: config
                .get_string(&AttributePath::new("gcloud_project_name"))
                .unwrap_or_default(),
            gcloud_project_credentials: config
                .get_string(&AttributePath::new("gcloud_project_credentials"))
                .unwrap_or_default(),
        })
    }
}

#[async_trait]
impl Resource for AccountResource {
    fn type_name(&self) -> &str {
        "aviatrix_account"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Onboards a cloud account onto the Aviatrix controller")
            .attribute(
                AttributeBuilder::new("account_name", AttributeType::String)
                    .description("Account name. Unique per controller")
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
                AttributeBuilder::new("aws_account_number", AttributeType::String)
                    .description("AWS account number")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("aws_iam", AttributeType::Bool)
                    .description("Use IAM roles instead of access keys")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("aws_access_key", AttributeType::String)
                    .description("AWS access key")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("aws_secret_key", AttributeType::String)
                    .description("AWS secret key")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("gcloud_project_name", AttributeType::String)
                    .description("GCP project ID")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("gcloud_project_credentials", AttributeType::String)
                    .description("Contents of the GCP service account credentials file")
                    .optional()
                    .sensitive()
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

        if let Ok(cloud_type) = request.config.get_number(&AttributePath::new("cloud_type")) {
            let cloud_type = cloud_type as i64;
            match cloud_type {
                CLOUD_TYPE_AWS => {
                    if request
                        .config
                        .get_string(&AttributePath::new("aws_account_number"))
                        .is_err()
                    {
                        diagnostics.push(Diagnostic::error(
                            "Missing aws_account_number",
                            "'aws_account_number' is required for AWS accounts (cloud_type = 1)",
                        ));
                    }
                }
                CLOUD_TYPE_GCP => {
                    if request
                        .config
                        .get_string(&AttributePath::new("gcloud_project_name"))
                        .is_err()
                    {
                        diagnostics.push(Diagnostic::error(
                            "Missing gcloud_project_name",
                            "'gcloud_project_name' is required for GCP accounts (cloud_type = 4)",
                        ));
                    }
                }
                _ => {
                    diagnostics.push(Diagnostic::error(
                        "Invalid cloud_type",
                        format!(
                            "cloud_type must be 1 (AWS) or 4 (GCP), got {}",
                            cloud_type
                        ),
                    ));
                }
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

        let account = match self.extract_account_config(&request.config) {
            Ok(account) => account,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        if let Err(e) = provider_data.client.create_account(&account).await {
            diagnostics.push(Diagnostic::error(
                "Failed to create account",
                format!("API error: {}", e),
            ));
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics,
            };
        }

        // Read back to confirm and pick up controller-side normalization.
        // Secrets are never returned by the API and stay as configured.
        let mut new_state = request.planned_state;
        match provider_data.client.get_account(&account.account_name).await {
            Ok(summary) => {
                let _ = new_state.set_number(
                    &AttributePath::new("cloud_type"),
                    summary.cloud_type as f64,
                );
                if !summary.aws_account_number.is_empty() {
                    let _ = new_state.set_string(
                        &AttributePath::new("aws_account_number"),
                        summary.aws_account_number,
                    );
                }
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read account after create",
                    format!("API error: {}", e),
                ));
            }
        }

        CreateResourceResponse {
            new_state,
            diagnostics,
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = vec![];

        let account_name = match request
            .current_state
            .get_string(&AttributePath::new("account_name"))
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

        match provider_data.client.get_account(&account_name).await {
            Ok(summary) => {
                let mut new_state = request.current_state.clone();
                let _ = new_state.set_number(
                    &AttributePath::new("cloud_type"),
                    summary.cloud_type as f64,
                );
                if !summary.aws_account_number.is_empty() {
                    let _ = new_state.set_string(
                        &AttributePath::new("aws_account_number"),
                        summary.aws_account_number,
                    );
                }
                if !summary.gcloud_project_name.is_empty() {
                    let _ = new_state.set_string(
                        &AttributePath::new("gcloud_project_name"),
                        summary.gcloud_project_name,
                    );
                }
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics,
                    private: request.private,
                }
            }
            Err(e) if e.is_not_found() => ReadResourceResponse {
                new_state: None,
                diagnostics,
                private: request.private,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read account",
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

        match self.extract_account_config(&request.config) {
            Ok(account) => match provider_data.client.update_account(&account).await {
                Ok(()) => UpdateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                },
                Err(e) => {
                    diagnostics.push(Diagnostic::error(
                        "Failed to update account",
                        format!("API error: {}", e),
                    ));
                    UpdateResourceResponse {
                        new_state: request.prior_state,
                        diagnostics,
                    }
                }
            },
            Err(diag) => {
                diagnostics.push(diag);
                UpdateResourceResponse {
                    new_state: request.prior_state,
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

        let account_name = match request
            .prior_state
            .get_string(&AttributePath::new("account_name"))
        {
            Ok(name) => name,
            Err(_) => return DeleteResourceResponse { diagnostics },
        };

        if let Err(e) = provider_data.client.delete_account(&account_name).await {
            diagnostics.push(Diagnostic::error(
                "Failed to delete account",
                format!("API error: {}", e),
            ));
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
        import_state_passthrough_id(
            &ctx,
            AttributePath::new("account_name"),
            &request,
            &mut response,
        );
        response
    }
}

#[async_trait]
impl ResourceWithConfigure for AccountResource {
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

    fn config_with(values: &[(&str, tfplug::types::Dynamic)]) -> DynamicValue {
        let mut config = DynamicValue::empty_object();
        for (name, value) in values {
            config
                .set_value(&AttributePath::new(name), value.clone())
                .unwrap();
        }
        config
    }

    #[tokio::test]
    async fn validate_rejects_unsupported_cloud_type() {
        use tfplug::types::Dynamic;

        let resource = AccountResource::new();
        let response = resource
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "aviatrix_account".to_string(),
                    config: config_with(&[
                        ("account_name", Dynamic::String("acc".to_string())),
                        ("cloud_type", Dynamic::Number(99.0)),
                    ]),
                },
            )
            .await;
        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].summary.contains("Invalid cloud_type"));
    }

    #[tokio::test]
    async fn validate_requires_aws_account_number_for_aws() {
        use tfplug::types::Dynamic;

        let resource = AccountResource::new();
        let response = resource
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "aviatrix_account".to_string(),
                    config: config_with(&[
                        ("account_name", Dynamic::String("acc".to_string())),
                        ("cloud_type", Dynamic::Number(1.0)),
                    ]),
                },
            )
            .await;
        assert!(response.diagnostics[0]
            .summary
            .contains("Missing aws_account_number"));
    }

    #[tokio::test]
    async fn create_without_provider_data_fails() {
        use tfplug::types::Dynamic;

        let resource = AccountResource::new();
        let config = config_with(&[
            ("account_name", Dynamic::String("acc".to_string())),
            ("cloud_type", Dynamic::Number(1.0)),
        ]);
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "aviatrix_account".to_string(),
                    planned_state: config.clone(),
                    config,
                },
            )
            .await;
        assert!(response.diagnostics[0]
            .summary
            .contains("Provider not configured"));
    }

    #[test]
    fn extract_account_config_picks_up_gcp_fields() {
        use tfplug::types::Dynamic;

        let resource = AccountResource::new();
        let config = config_with(&[
            ("account_name", Dynamic::String("acc".to_string())),
            ("cloud_type", Dynamic::Number(4.0)),
            (
                "gcloud_project_name",
                Dynamic::String("my-project".to_string()),
            ),
            (
                "gcloud_project_credentials",
                Dynamic::String("{}".to_string()),
            ),
        ]);
        let account = resource.extract_account_config(&config).unwrap();
        assert_eq!(account.cloud_type, 4);
        assert_eq!(account.gcloud_project_name, "my-project");
    }
}
