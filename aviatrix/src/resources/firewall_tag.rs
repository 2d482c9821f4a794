//! Firewall tag (named CIDR list) resource

use std::collections::HashMap;

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

use crate::api::{ApiError, CidrMember, Client};

#[derive(Default)]
pub struct FirewallTagResource {
    provider_data: Option<crate::AviatrixProviderData>,
}

fn dynamic_to_member(value: &Dynamic) -> Option<CidrMember> {
    let map = match value {
        Dynamic::Map(map) => map,
        _ => return None,
    };
    let field = |name: &str| match map.get(name) {
        Some(Dynamic::String(value)) => value.clone(),
        _ => String::new(),
    };
    Some(CidrMember {
        name: field("cidr_tag_name"),
        cidr: field("cidr"),
    })
}

fn member_to_dynamic(member: &CidrMember) -> Dynamic {
    Dynamic::Map(HashMap::from([
        (
            "cidr_tag_name".to_string(),
            Dynamic::String(member.name.clone()),
        ),
        ("cidr".to_string(), Dynamic::String(member.cidr.clone())),
    ]))
}

fn members_from_value(value: &DynamicValue) -> Vec<CidrMember> {
    value
        .get_list(&AttributePath::new("cidr_list"))
        .map(|entries| entries.iter().filter_map(dynamic_to_member).collect())
        .unwrap_or_default()
}

impl FirewallTagResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn refresh_state(
        &self,
        client: &Client,
        tag_name: &str,
        mut state: DynamicValue,
    ) -> Result<DynamicValue, ApiError> {
        let detail = client.get_firewall_tag(tag_name).await?;

        let _ = state.set_string(&AttributePath::new("firewall_tag"), tag_name.to_string());
        let _ = state.set_list(
            &AttributePath::new("cidr_list"),
            detail.cidr_list.iter().map(member_to_dynamic).collect(),
        );
        Ok(state)
    }
}

#[async_trait]
impl Resource for FirewallTagResource {
    fn type_name(&self) -> &str {
        "aviatrix_firewall_tag"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let member_type = AttributeType::Object(HashMap::from([
            ("cidr_tag_name".to_string(), AttributeType::String),
            ("cidr".to_string(), AttributeType::String),
        ]));

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a named CIDR tag for use in Aviatrix firewall rules")
            .attribute(
                AttributeBuilder::new("firewall_tag", AttributeType::String)
                    .description("Name of the tag")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("cidr_list", AttributeType::List(Box::new(member_type)))
                    .description("Named CIDR members of the tag")
                    .optional()
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

        for (index, member) in members_from_value(&request.config).iter().enumerate() {
            if member.name.is_empty() || member.cidr.is_empty() {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid cidr_list member",
                        "Both 'cidr_tag_name' and 'cidr' are required for each member",
                    )
                    .with_attribute(AttributePath::new("cidr_list").index(index as i64)),
                );
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

        let tag_name = match request
            .config
            .get_string(&AttributePath::new("firewall_tag"))
        {
            Ok(name) => name,
            Err(_) => {
                diagnostics.push(Diagnostic::error(
                    "Missing firewall_tag",
                    "The 'firewall_tag' attribute is required",
                ));
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };
        let members = members_from_value(&request.config);

        let apply = async {
            provider_data.client.create_firewall_tag(&tag_name).await?;
            if !members.is_empty() {
                provider_data
                    .client
                    .update_firewall_tag_members(&tag_name, &members)
                    .await?;
            }
            Ok::<(), ApiError>(())
        };
        if let Err(e) = apply.await {
            diagnostics.push(Diagnostic::error(
                "Failed to create firewall tag",
                format!("API error: {}", e),
            ));
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics,
            };
        }

        match self
            .refresh_state(&provider_data.client, &tag_name, request.planned_state.clone())
            .await
        {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read firewall tag after create",
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

        let tag_name = match request
            .current_state
            .get_string(&AttributePath::new("firewall_tag"))
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
                &tag_name,
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
                    "Failed to read firewall tag",
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

        let tag_name = match request
            .config
            .get_string(&AttributePath::new("firewall_tag"))
        {
            Ok(name) => name,
            Err(_) => {
                diagnostics.push(Diagnostic::error(
                    "Missing firewall_tag",
                    "The 'firewall_tag' attribute is required",
                ));
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        };
        let members = members_from_value(&request.config);

        if members_from_value(&request.prior_state) != members {
            if let Err(e) = provider_data
                .client
                .update_firewall_tag_members(&tag_name, &members)
                .await
            {
                diagnostics.push(Diagnostic::error(
                    "Failed to update firewall tag",
                    format!("API error: {}", e),
                ));
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        }

        match self
            .refresh_state(&provider_data.client, &tag_name, request.planned_state.clone())
            .await
        {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read firewall tag after update",
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

        let tag_name = match request
            .prior_state
            .get_string(&AttributePath::new("firewall_tag"))
        {
            Ok(name) => name,
            Err(_) => return DeleteResourceResponse { diagnostics },
        };

        match provider_data.client.delete_firewall_tag(&tag_name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to delete firewall tag",
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
        import_state_passthrough_id(
            &ctx,
            AttributePath::new("firewall_tag"),
            &request,
            &mut response,
        );
        response
    }
}

#[async_trait]
impl ResourceWithConfigure for FirewallTagResource {
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

    #[tokio::test]
    async fn validate_rejects_member_without_cidr() {
        let mut config = DynamicValue::empty_object();
        config
            .set_string(&AttributePath::new("firewall_tag"), "tag-1".to_string())
            .unwrap();
        config
            .set_list(
                &AttributePath::new("cidr_list"),
                vec![Dynamic::Map(HashMap::from([(
                    "cidr_tag_name".to_string(),
                    Dynamic::String("office".to_string()),
                )]))],
            )
            .unwrap();

        let resource = FirewallTagResource::new();
        let response = resource
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "aviatrix_firewall_tag".to_string(),
                    config,
                },
            )
            .await;
        assert!(response.diagnostics[0]
            .summary
            .contains("Invalid cidr_list member"));
    }

    #[test]
    fn member_round_trips_through_dynamic() {
        let member = CidrMember {
            name: "office".to_string(),
            cidr: "192.0.2.0/24".to_string(),
        };
        let back = dynamic_to_member(&member_to_dynamic(&member)).unwrap();
        assert_eq!(back, member);
    }

    #[tokio::test]
    async fn delete_without_provider_data_is_silent() {
        let resource = FirewallTagResource::new();
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "aviatrix_firewall_tag".to_string(),
                    prior_state: DynamicValue::empty_object(),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
    }
}
