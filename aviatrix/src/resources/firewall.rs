//! Stateful firewall (base policy plus access rules) resource

use std::collections::HashMap;

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
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
use tfplug::validator::StringInSliceValidator;

use crate::api::{ApiError, Client, FirewallPolicy};
use crate::resources::util::{bool_or, string_or_default};

const VALID_ACTIONS: &[&str] = &["allow", "deny", "force-drop"];
const VALID_PROTOCOLS: &[&str] = &["all", "tcp", "udp", "icmp", "sctp", "rdp", "dccp"];

#[derive(Default)]
pub struct FirewallResource {
    provider_data: Option<crate::AviatrixProviderData>,
}

fn policy_field(map: &HashMap<String, Dynamic>, name: &str) -> String {
    match map.get(name) {
        Some(Dynamic::String(value)) => value.clone(),
        _ => String::new(),
    }
}

fn policy_log_enabled(map: &HashMap<String, Dynamic>) -> bool {
    matches!(map.get("log_enabled"), Some(Dynamic::Bool(true)))
}

fn dynamic_to_policy(value: &Dynamic) -> Option<FirewallPolicy> {
    let map = match value {
        Dynamic::Map(map) => map,
        _ => return None,
    };
    Some(FirewallPolicy {
        s_ip: policy_field(map, "src_ip"),
        d_ip: policy_field(map, "dst_ip"),
        protocol: policy_field(map, "protocol"),
        port: policy_field(map, "port"),
        deny_allow: policy_field(map, "action"),
        log_enable: if policy_log_enabled(map) { "on" } else { "off" }.to_string(),
        description: policy_field(map, "description"),
    })
}

fn policy_to_dynamic(policy: &FirewallPolicy) -> Dynamic {
    Dynamic::Map(HashMap::from([
        ("src_ip".to_string(), Dynamic::String(policy.s_ip.clone())),
        ("dst_ip".to_string(), Dynamic::String(policy.d_ip.clone())),
        (
            "protocol".to_string(),
            Dynamic::String(policy.protocol.clone()),
        ),
        ("port".to_string(), Dynamic::String(policy.port.clone())),
        (
            "action".to_string(),
            Dynamic::String(policy.deny_allow.clone()),
        ),
        (
            "log_enabled".to_string(),
            Dynamic::Bool(policy.log_enable == "on"),
        ),
        (
            "description".to_string(),
            Dynamic::String(policy.description.clone()),
        ),
    ]))
}

fn policies_from_value(value: &DynamicValue) -> Vec<FirewallPolicy> {
    value
        .get_list(&AttributePath::new("policy"))
        .map(|entries| entries.iter().filter_map(dynamic_to_policy).collect())
        .unwrap_or_default()
}

/// Reorders the controller's rule list to match the known (config/state)
/// order, appending rules the controller has that we do not know about.
fn reconcile_policies(
    known: &[FirewallPolicy],
    controller: &[FirewallPolicy],
) -> Vec<FirewallPolicy> {
    let mut by_key: HashMap<String, &FirewallPolicy> =
        controller.iter().map(|p| (p.key(), p)).collect();
    let mut result = vec![];
    for policy in known {
        if let Some(found) = by_key.remove(&policy.key()) {
            result.push(found.clone());
        }
    }
    for policy in controller {
        if by_key.remove(&policy.key()).is_some() {
            result.push(policy.clone());
        }
    }
    result
}

impl FirewallResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn refresh_state(
        &self,
        client: &Client,
        gw_name: &str,
        mut state: DynamicValue,
    ) -> Result<DynamicValue, ApiError> {
        let detail = client.get_firewall(gw_name).await?;

        let _ = state.set_string(&AttributePath::new("gw_name"), gw_name.to_string());
        let _ = state.set_string(&AttributePath::new("base_policy"), detail.base_policy);
        let _ = state.set_bool(
            &AttributePath::new("base_log_enabled"),
            detail.base_policy_log_enable == "on",
        );

        let known = policies_from_value(&state);
        let reconciled = reconcile_policies(&known, &detail.security_rules);
        let _ = state.set_list(
            &AttributePath::new("policy"),
            reconciled.iter().map(policy_to_dynamic).collect(),
        );

        Ok(state)
    }
}

#[async_trait]
impl Resource for FirewallResource {
    fn type_name(&self) -> &str {
        "aviatrix_firewall"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let policy_type = AttributeType::Object(HashMap::from([
            ("src_ip".to_string(), AttributeType::String),
            ("dst_ip".to_string(), AttributeType::String),
            ("protocol".to_string(), AttributeType::String),
            ("port".to_string(), AttributeType::String),
            ("action".to_string(), AttributeType::String),
            ("log_enabled".to_string(), AttributeType::Bool),
            ("description".to_string(), AttributeType::String),
        ]));

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages the stateful firewall policy on an Aviatrix gateway")
            .attribute(
                AttributeBuilder::new("gw_name", AttributeType::String)
                    .description("Gateway the firewall applies to")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("base_policy", AttributeType::String)
                    .description("Default action for unmatched traffic: 'allow-all' or 'deny-all'")
                    .optional()
                    .computed()
                    .default(StaticDefault::string("deny-all"))
                    .validator(StringInSliceValidator::create(&["allow-all", "deny-all"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("base_log_enabled", AttributeType::Bool)
                    .description("Log traffic matched by the base policy")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("policy", AttributeType::List(Box::new(policy_type)))
                    .description("Ordered access rules evaluated before the base policy")
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

        for (index, policy) in policies_from_value(&request.config).iter().enumerate() {
            if !VALID_ACTIONS.contains(&policy.deny_allow.as_str()) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid policy action",
                        format!(
                            "Policy action must be one of {:?}, got '{}'",
                            VALID_ACTIONS, policy.deny_allow
                        ),
                    )
                    .with_attribute(AttributePath::new("policy").index(index as i64)),
                );
            }
            if !VALID_PROTOCOLS.contains(&policy.protocol.as_str()) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid policy protocol",
                        format!(
                            "Policy protocol must be one of {:?}, got '{}'",
                            VALID_PROTOCOLS, policy.protocol
                        ),
                    )
                    .with_attribute(AttributePath::new("policy").index(index as i64)),
                );
            }
            if policy.protocol == "all" && !policy.port.is_empty() {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid policy port",
                        "Port must be empty when protocol is 'all'",
                    )
                    .with_attribute(AttributePath::new("policy").index(index as i64)),
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

        let gw_name = match request.config.get_string(&AttributePath::new("gw_name")) {
            Ok(name) => name,
            Err(_) => {
                diagnostics.push(Diagnostic::error(
                    "Missing gw_name",
                    "The 'gw_name' attribute is required",
                ));
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        let base_policy = {
            let configured = string_or_default(&request.config, "base_policy");
            if configured.is_empty() {
                "deny-all".to_string()
            } else {
                configured
            }
        };
        let base_log = bool_or(&request.config, "base_log_enabled", false);
        let policies = policies_from_value(&request.config);

        let apply = async {
            provider_data
                .client
                .set_base_policy(&gw_name, &base_policy, base_log)
                .await?;
            provider_data
                .client
                .update_firewall_policies(&gw_name, &policies)
                .await
        };
        if let Err(e) = apply.await {
            diagnostics.push(Diagnostic::error(
                "Failed to create firewall",
                format!("API error: {}", e),
            ));
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics,
            };
        }

        match self
            .refresh_state(&provider_data.client, &gw_name, request.planned_state.clone())
            .await
        {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read firewall after create",
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
                    "Failed to read firewall",
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

        let gw_name = match request.config.get_string(&AttributePath::new("gw_name")) {
            Ok(name) => name,
            Err(_) => {
                diagnostics.push(Diagnostic::error(
                    "Missing gw_name",
                    "The 'gw_name' attribute is required",
                ));
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        };

        let base_policy = {
            let configured = string_or_default(&request.config, "base_policy");
            if configured.is_empty() {
                "deny-all".to_string()
            } else {
                configured
            }
        };
        let base_log = bool_or(&request.config, "base_log_enabled", false);
        let policies = policies_from_value(&request.config);

        let apply = async {
            let prior_base = string_or_default(&request.prior_state, "base_policy");
            let prior_log = bool_or(&request.prior_state, "base_log_enabled", false);
            if prior_base != base_policy || prior_log != base_log {
                provider_data
                    .client
                    .set_base_policy(&gw_name, &base_policy, base_log)
                    .await?;
            }
            if policies_from_value(&request.prior_state) != policies {
                provider_data
                    .client
                    .update_firewall_policies(&gw_name, &policies)
                    .await?;
            }
            Ok::<(), ApiError>(())
        };
        if let Err(e) = apply.await {
            diagnostics.push(Diagnostic::error(
                "Failed to update firewall",
                format!("API error: {}", e),
            ));
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics,
            };
        }

        match self
            .refresh_state(&provider_data.client, &gw_name, request.planned_state.clone())
            .await
        {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read firewall after update",
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

        // The firewall itself cannot be removed from a gateway; deleting the
        // resource clears the rule list instead.
        match provider_data
            .client
            .update_firewall_policies(&gw_name, &[])
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to clear firewall policies",
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
impl ResourceWithConfigure for FirewallResource {
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

    fn rule(s_ip: &str, protocol: &str, port: &str) -> FirewallPolicy {
        FirewallPolicy {
            s_ip: s_ip.to_string(),
            d_ip: "10.1.0.0/24".to_string(),
            protocol: protocol.to_string(),
            port: port.to_string(),
            deny_allow: "allow".to_string(),
            log_enable: "off".to_string(),
            description: String::new(),
        }
    }

    fn config_with_policy(policy: FirewallPolicy) -> DynamicValue {
        let mut config = DynamicValue::empty_object();
        config
            .set_string(&AttributePath::new("gw_name"), "gw-1".to_string())
            .unwrap();
        config
            .set_list(&AttributePath::new("policy"), vec![policy_to_dynamic(&policy)])
            .unwrap();
        config
    }

    #[tokio::test]
    async fn validate_rejects_unknown_protocol() {
        let resource = FirewallResource::new();
        let response = resource
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "aviatrix_firewall".to_string(),
                    config: config_with_policy(rule("10.0.0.0/24", "gre", "443")),
                },
            )
            .await;
        assert!(response.diagnostics[0]
            .summary
            .contains("Invalid policy protocol"));
    }

    #[tokio::test]
    async fn validate_rejects_port_with_protocol_all() {
        let resource = FirewallResource::new();
        let response = resource
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "aviatrix_firewall".to_string(),
                    config: config_with_policy(rule("10.0.0.0/24", "all", "443")),
                },
            )
            .await;
        assert!(response.diagnostics[0].summary.contains("Invalid policy port"));
    }

    #[test]
    fn reconcile_keeps_known_order_and_appends_extras() {
        let a = rule("10.0.0.0/24", "tcp", "443");
        let b = rule("10.0.1.0/24", "tcp", "22");
        let extra = rule("10.0.2.0/24", "udp", "53");

        // Controller returns them in its own order plus one unknown rule.
        let reconciled =
            reconcile_policies(&[a.clone(), b.clone()], &[extra.clone(), b.clone(), a.clone()]);
        assert_eq!(reconciled, vec![a, b, extra]);
    }

    #[test]
    fn policy_round_trips_through_dynamic() {
        let mut policy = rule("10.0.0.0/24", "tcp", "443");
        policy.log_enable = "on".to_string();
        let back = dynamic_to_policy(&policy_to_dynamic(&policy)).unwrap();
        assert_eq!(back, policy);
    }
}
