//! gRPC server for the Terraform Plugin Protocol v6.9
//!
//! Serves a [`Provider`] on an ephemeral localhost port, printing the
//! go-plugin handshake line on stdout so Terraform can connect. The listener
//! uses TLS when a certificate pair is configured and plaintext otherwise.
//! Resources and data sources are created on demand from the provider's
//! factories and configured with the shared provider data before each
//! operation.

use crate::context::Context;
use crate::data_source::{
    ConfigureDataSourceRequest, DataSourceSchemaRequest, DataSourceWithConfigure,
    ReadDataSourceRequest, ValidateDataSourceConfigRequest,
};
use crate::error::{Result, TfplugError};
use crate::proto;
use crate::proto::provider_server::{
    Provider as ProtoProvider, ProviderServer as ProtoProviderServer,
};
use crate::provider::{
    ConfigureProviderRequest, Provider, ProviderSchemaRequest, ValidateProviderConfigRequest,
};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ReadResourceRequest, ResourceSchemaRequest, ResourceWithConfigure,
    UpdateResourceRequest, ValidateResourceConfigRequest,
};
use crate::schema::{
    Attribute, AttributeType, Block, DefaultRequest, NestedBlock, NestingMode, PlanModifierRequest,
    Schema, StringKind, ValidatorRequest,
};
use crate::types::{
    AttributePath, AttributePathStep, Diagnostic, DiagnosticSeverity, Dynamic, DynamicValue,
};
use std::any::Any;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Identity, Server, ServerTlsConfig};
use tonic::{Request, Response, Status};
use tracing::{debug, warn};

pub struct ProviderServer<P: Provider> {
    provider: Arc<RwLock<P>>,
    tls_identity: Option<(PathBuf, PathBuf)>,
}

impl<P: Provider + 'static> ProviderServer<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider: Arc::new(RwLock::new(provider)),
            tls_identity: None,
        }
    }

    /// Serve over TLS with the given PEM certificate and key files.
    pub fn with_tls(mut self, cert_path: PathBuf, key_path: PathBuf) -> Self {
        self.tls_identity = Some((cert_path, key_path));
        self
    }

    pub async fn run(self) -> Result<()> {
        let tls_config = match &self.tls_identity {
            Some((cert_path, key_path)) => {
                rustls::crypto::aws_lc_rs::default_provider()
                    .install_default()
                    .map_err(|_| {
                        TfplugError::TlsError("crypto provider already installed".to_string())
                    })?;

                let cert = tokio::fs::read(cert_path).await?;
                let key = tokio::fs::read(key_path).await?;
                let identity = Identity::from_pem(cert, key);
                Some(ServerTlsConfig::new().identity(identity))
            }
            None => None,
        };

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let bound_addr = listener.local_addr()?;

        // go-plugin handshake: CORE-PROTOCOL|PLUGIN-PROTOCOL|NETWORK|ADDR|PROTOCOL
        println!("1|6|tcp|127.0.0.1:{}|grpc", bound_addr.port());
        debug!(
            port = bound_addr.port(),
            tls = tls_config.is_some(),
            "provider server listening"
        );

        let stream = TcpListenerStream::new(listener);
        let service = ProviderHandler {
            provider: self.provider.clone(),
            provider_data: Arc::new(RwLock::new(None)),
        };

        let mut builder = Server::builder();
        if let Some(tls_config) = tls_config {
            builder = builder.tls_config(tls_config)?;
        }

        builder
            .add_service(ProtoProviderServer::new(service))
            .serve_with_incoming(stream)
            .await?;

        Ok(())
    }
}

struct ProviderHandler<P: Provider> {
    provider: Arc<RwLock<P>>,
    /// Set once by ConfigureProvider, then handed to every resource and data
    /// source created afterwards.
    provider_data: Arc<RwLock<Option<Arc<dyn Any + Send + Sync>>>>,
}

impl<P: Provider + 'static> ProviderHandler<P> {
    async fn resource_instance(
        &self,
        type_name: &str,
    ) -> std::result::Result<Box<dyn ResourceWithConfigure>, Status> {
        let factory = {
            let provider = self.provider.read().await;
            provider.resources().remove(type_name)
        };
        match factory {
            Some(factory) => Ok(factory()),
            None => Err(Status::not_found(format!(
                "unknown resource type: {type_name}"
            ))),
        }
    }

    async fn configured_resource(
        &self,
        type_name: &str,
    ) -> std::result::Result<Box<dyn ResourceWithConfigure>, Status> {
        let mut resource = self.resource_instance(type_name).await?;
        let provider_data = self.provider_data.read().await.clone();
        let response = resource
            .configure(Context::new(), ConfigureResourceRequest { provider_data })
            .await;
        for diagnostic in &response.diagnostics {
            if diagnostic.severity == DiagnosticSeverity::Error {
                warn!(type_name, summary = %diagnostic.summary, "resource configure failed");
            }
        }
        Ok(resource)
    }

    async fn data_source_instance(
        &self,
        type_name: &str,
    ) -> std::result::Result<Box<dyn DataSourceWithConfigure>, Status> {
        let factory = {
            let provider = self.provider.read().await;
            provider.data_sources().remove(type_name)
        };
        match factory {
            Some(factory) => Ok(factory()),
            None => Err(Status::not_found(format!(
                "unknown data source type: {type_name}"
            ))),
        }
    }

    async fn configured_data_source(
        &self,
        type_name: &str,
    ) -> std::result::Result<Box<dyn DataSourceWithConfigure>, Status> {
        let mut data_source = self.data_source_instance(type_name).await?;
        let provider_data = self.provider_data.read().await.clone();
        let response = data_source
            .configure(Context::new(), ConfigureDataSourceRequest { provider_data })
            .await;
        for diagnostic in &response.diagnostics {
            if diagnostic.severity == DiagnosticSeverity::Error {
                warn!(type_name, summary = %diagnostic.summary, "data source configure failed");
            }
        }
        Ok(data_source)
    }
}

#[tonic::async_trait]
impl<P: Provider + 'static> ProtoProvider for ProviderHandler<P> {
    async fn get_metadata(
        &self,
        _request: Request<proto::get_metadata::Request>,
    ) -> std::result::Result<Response<proto::get_metadata::Response>, Status> {
        let provider = self.provider.read().await;
        let resources = provider
            .resources()
            .into_keys()
            .map(|type_name| proto::get_metadata::ResourceMetadata { type_name })
            .collect();
        let data_sources = provider
            .data_sources()
            .into_keys()
            .map(|type_name| proto::get_metadata::DataSourceMetadata { type_name })
            .collect();

        Ok(Response::new(proto::get_metadata::Response {
            server_capabilities: Some(server_capabilities()),
            diagnostics: vec![],
            data_sources,
            resources,
            functions: vec![],
            ephemeral_resources: vec![],
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<proto::get_provider_schema::Request>,
    ) -> std::result::Result<Response<proto::get_provider_schema::Response>, Status> {
        let provider = self.provider.read().await;
        let schema_response = provider.schema(Context::new(), ProviderSchemaRequest).await;
        let mut diagnostics = diagnostics_to_proto(schema_response.diagnostics);

        let mut resource_schemas = HashMap::new();
        for (type_name, factory) in provider.resources() {
            let resource = factory();
            let response = resource.schema(Context::new(), ResourceSchemaRequest).await;
            diagnostics.extend(diagnostics_to_proto(response.diagnostics));
            resource_schemas.insert(type_name, schema_to_proto(&response.schema));
        }

        let mut data_source_schemas = HashMap::new();
        for (type_name, factory) in provider.data_sources() {
            let data_source = factory();
            let response = data_source
                .schema(Context::new(), DataSourceSchemaRequest)
                .await;
            diagnostics.extend(diagnostics_to_proto(response.diagnostics));
            data_source_schemas.insert(type_name, schema_to_proto(&response.schema));
        }

        Ok(Response::new(proto::get_provider_schema::Response {
            provider: Some(schema_to_proto(&schema_response.schema)),
            resource_schemas,
            data_source_schemas,
            diagnostics,
            provider_meta: None,
            server_capabilities: Some(server_capabilities()),
            functions: HashMap::new(),
            ephemeral_resource_schemas: HashMap::new(),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<proto::validate_provider_config::Request>,
    ) -> std::result::Result<Response<proto::validate_provider_config::Response>, Status> {
        let req = request.into_inner();
        let config = match decode_dynamic(&req.config) {
            Ok(config) => config,
            Err(error) => {
                // Config may still carry unknown values at this stage; defer
                // validation to configure.
                debug!(%error, "skipping provider config validation");
                return Ok(Response::new(proto::validate_provider_config::Response {
                    diagnostics: vec![],
                }));
            }
        };

        let provider = self.provider.read().await;
        let response = provider
            .validate(Context::new(), ValidateProviderConfigRequest { config })
            .await;

        Ok(Response::new(proto::validate_provider_config::Response {
            diagnostics: diagnostics_to_proto(response.diagnostics),
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<proto::configure_provider::Request>,
    ) -> std::result::Result<Response<proto::configure_provider::Response>, Status> {
        let req = request.into_inner();
        let config = decode_dynamic(&req.config).map_err(status_from_error)?;

        let response = {
            let mut provider = self.provider.write().await;
            provider
                .configure(
                    Context::new(),
                    ConfigureProviderRequest {
                        terraform_version: req.terraform_version,
                        config,
                    },
                )
                .await
        };

        *self.provider_data.write().await = response.provider_data;

        Ok(Response::new(proto::configure_provider::Response {
            diagnostics: diagnostics_to_proto(response.diagnostics),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<proto::validate_resource_config::Request>,
    ) -> std::result::Result<Response<proto::validate_resource_config::Response>, Status> {
        let req = request.into_inner();
        let resource = self.resource_instance(&req.type_name).await?;
        let schema_response = resource.schema(Context::new(), ResourceSchemaRequest).await;

        let config = match decode_dynamic(&req.config) {
            Ok(config) => config,
            Err(error) => {
                debug!(type_name = %req.type_name, %error, "skipping resource config validation");
                return Ok(Response::new(proto::validate_resource_config::Response {
                    diagnostics: vec![],
                }));
            }
        };

        let mut diagnostics = validate_against_schema(&schema_response.schema, &config);

        let response = resource
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: req.type_name,
                    config,
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        Ok(Response::new(proto::validate_resource_config::Response {
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<proto::validate_data_resource_config::Request>,
    ) -> std::result::Result<Response<proto::validate_data_resource_config::Response>, Status> {
        let req = request.into_inner();
        let data_source = self.data_source_instance(&req.type_name).await?;
        let schema_response = data_source
            .schema(Context::new(), DataSourceSchemaRequest)
            .await;

        let config = match decode_dynamic(&req.config) {
            Ok(config) => config,
            Err(error) => {
                debug!(type_name = %req.type_name, %error, "skipping data source config validation");
                return Ok(Response::new(
                    proto::validate_data_resource_config::Response {
                        diagnostics: vec![],
                    },
                ));
            }
        };

        let mut diagnostics = validate_against_schema(&schema_response.schema, &config);

        let response = data_source
            .validate(
                Context::new(),
                ValidateDataSourceConfigRequest {
                    type_name: req.type_name,
                    config,
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        Ok(Response::new(
            proto::validate_data_resource_config::Response {
                diagnostics: diagnostics_to_proto(diagnostics),
            },
        ))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<proto::upgrade_resource_state::Request>,
    ) -> std::result::Result<Response<proto::upgrade_resource_state::Response>, Status> {
        let req = request.into_inner();

        // No schema migrations yet: pass the stored JSON state through.
        let json = req
            .raw_state
            .map(|raw_state| raw_state.json)
            .unwrap_or_default();

        Ok(Response::new(proto::upgrade_resource_state::Response {
            upgraded_state: Some(proto::DynamicValue {
                msgpack: vec![],
                json,
            }),
            diagnostics: vec![],
        }))
    }

    async fn get_resource_identity_schemas(
        &self,
        _request: Request<proto::get_resource_identity_schemas::Request>,
    ) -> std::result::Result<Response<proto::get_resource_identity_schemas::Response>, Status> {
        Ok(Response::new(
            proto::get_resource_identity_schemas::Response {
                identity_schemas: HashMap::new(),
                diagnostics: vec![],
            },
        ))
    }

    async fn upgrade_resource_identity(
        &self,
        _request: Request<proto::upgrade_resource_identity::Request>,
    ) -> std::result::Result<Response<proto::upgrade_resource_identity::Response>, Status> {
        Err(Status::unimplemented(
            "resource identity is not supported by this provider",
        ))
    }

    async fn read_resource(
        &self,
        request: Request<proto::read_resource::Request>,
    ) -> std::result::Result<Response<proto::read_resource::Response>, Status> {
        let req = request.into_inner();
        let resource = self.configured_resource(&req.type_name).await?;
        let current_state = decode_dynamic(&req.current_state).map_err(status_from_error)?;

        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: req.type_name,
                    current_state,
                    private: req.private,
                },
            )
            .await;

        // None means the remote object is gone; a null state removes it.
        let new_state = match response.new_state {
            Some(state) => state,
            None => DynamicValue::null(),
        };

        Ok(Response::new(proto::read_resource::Response {
            new_state: Some(encode_dynamic(&new_state)?),
            diagnostics: diagnostics_to_proto(response.diagnostics),
            private: response.private,
            deferred: None,
            new_identity: None,
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<proto::plan_resource_change::Request>,
    ) -> std::result::Result<Response<proto::plan_resource_change::Response>, Status> {
        let req = request.into_inner();
        let resource = self.resource_instance(&req.type_name).await?;
        let schema_response = resource.schema(Context::new(), ResourceSchemaRequest).await;
        let schema = &schema_response.schema;

        let prior_state = decode_dynamic(&req.prior_state).map_err(status_from_error)?;
        let proposed_new_state =
            decode_dynamic(&req.proposed_new_state).map_err(status_from_error)?;
        let config = decode_dynamic(&req.config).map_err(status_from_error)?;

        // Destroy: the proposed state is null and stays null.
        if proposed_new_state.is_null() {
            return Ok(Response::new(proto::plan_resource_change::Response {
                planned_state: Some(encode_dynamic(&proposed_new_state)?),
                requires_replace: vec![],
                planned_private: req.prior_private,
                diagnostics: vec![],
                legacy_type_system: false,
                deferred: None,
                planned_identity: None,
            }));
        }

        let mut planned_state = proposed_new_state.clone();
        let mut requires_replace = vec![];
        let mut diagnostics = vec![];
        let is_create = prior_state.is_null();

        if matches!(planned_state.value, Dynamic::Map(_)) {
            for attribute in &schema.block.attributes {
                let path = AttributePath::new(&attribute.name);
                let config_value = config.get_value(&path);
                let state_value = prior_state.get_value(&path);
                let mut plan_value = planned_state.get_value(&path);

                if config_value.is_null() {
                    if let (true, Some(default)) = (attribute.optional, &attribute.default) {
                        plan_value = default
                            .default_value(DefaultRequest { path: path.clone() })
                            .value;
                    } else if attribute.computed && plan_value.is_null() {
                        // Computed attributes keep their prior value; on
                        // create they stay unknown until apply fills them in.
                        plan_value = if is_create {
                            DynamicValue::unknown()
                        } else {
                            state_value.clone()
                        };
                    }
                }

                for modifier in &attribute.plan_modifiers {
                    let response = modifier.modify(PlanModifierRequest {
                        config_value: config_value.clone(),
                        state_value: state_value.clone(),
                        plan_value: plan_value.clone(),
                        path: path.clone(),
                    });
                    plan_value = response.plan_value;
                    if response.requires_replace {
                        requires_replace.push(path_to_proto(&path));
                    }
                    diagnostics.extend(response.diagnostics);
                }

                planned_state
                    .set_value(&path, plan_value.value)
                    .map_err(|error| Status::internal(error.to_string()))?;
            }
        }

        Ok(Response::new(proto::plan_resource_change::Response {
            planned_state: Some(encode_dynamic(&planned_state)?),
            requires_replace,
            planned_private: req.prior_private,
            diagnostics: diagnostics_to_proto(diagnostics),
            legacy_type_system: false,
            deferred: None,
            planned_identity: None,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<proto::apply_resource_change::Request>,
    ) -> std::result::Result<Response<proto::apply_resource_change::Response>, Status> {
        let req = request.into_inner();
        let resource = self.configured_resource(&req.type_name).await?;

        let prior_state = decode_dynamic(&req.prior_state).map_err(status_from_error)?;
        let planned_state = decode_dynamic(&req.planned_state).map_err(status_from_error)?;
        let config = decode_dynamic(&req.config).map_err(status_from_error)?;

        let is_create = prior_state.is_null();
        let is_delete = planned_state.is_null();

        let (new_state, diagnostics) = if is_delete {
            let response = resource
                .delete(
                    Context::new(),
                    DeleteResourceRequest {
                        type_name: req.type_name,
                        prior_state,
                    },
                )
                .await;
            (DynamicValue::null(), response.diagnostics)
        } else if is_create {
            let response = resource
                .create(
                    Context::new(),
                    CreateResourceRequest {
                        type_name: req.type_name,
                        planned_state: planned_state.clone(),
                        config,
                    },
                )
                .await;
            if has_errors(&response.diagnostics) {
                // Operation failed; hand the planned state back so Terraform
                // does not record a half-created object as final.
                (planned_state, response.diagnostics)
            } else {
                (response.new_state, response.diagnostics)
            }
        } else {
            let response = resource
                .update(
                    Context::new(),
                    UpdateResourceRequest {
                        type_name: req.type_name,
                        prior_state: prior_state.clone(),
                        planned_state,
                        config,
                    },
                )
                .await;
            if has_errors(&response.diagnostics) {
                (prior_state, response.diagnostics)
            } else {
                (response.new_state, response.diagnostics)
            }
        };

        Ok(Response::new(proto::apply_resource_change::Response {
            new_state: Some(encode_dynamic(&new_state)?),
            diagnostics: diagnostics_to_proto(diagnostics),
            private: req.planned_private,
            legacy_type_system: false,
            new_identity: None,
        }))
    }

    async fn import_resource_state(
        &self,
        request: Request<proto::import_resource_state::Request>,
    ) -> std::result::Result<Response<proto::import_resource_state::Response>, Status> {
        let req = request.into_inner();
        let resource = self.configured_resource(&req.type_name).await?;

        let response = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: req.type_name,
                    id: req.id,
                },
            )
            .await;

        let mut imported_resources = Vec::with_capacity(response.imported_resources.len());
        for imported in response.imported_resources {
            imported_resources.push(proto::import_resource_state::ImportedResource {
                type_name: imported.type_name,
                state: Some(encode_dynamic(&imported.state)?),
                private: imported.private,
                identity: None,
            });
        }

        Ok(Response::new(proto::import_resource_state::Response {
            imported_resources,
            diagnostics: diagnostics_to_proto(response.diagnostics),
            deferred: None,
        }))
    }

    async fn move_resource_state(
        &self,
        _request: Request<proto::move_resource_state::Request>,
    ) -> std::result::Result<Response<proto::move_resource_state::Response>, Status> {
        Err(Status::unimplemented(
            "moving resource state is not supported by this provider",
        ))
    }

    async fn read_data_source(
        &self,
        request: Request<proto::read_data_source::Request>,
    ) -> std::result::Result<Response<proto::read_data_source::Response>, Status> {
        let req = request.into_inner();
        let data_source = self.configured_data_source(&req.type_name).await?;
        let config = decode_dynamic(&req.config).map_err(status_from_error)?;

        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: req.type_name,
                    config,
                },
            )
            .await;

        Ok(Response::new(proto::read_data_source::Response {
            state: Some(encode_dynamic(&response.state)?),
            diagnostics: diagnostics_to_proto(response.diagnostics),
            deferred: None,
        }))
    }

    async fn validate_ephemeral_resource_config(
        &self,
        _request: Request<proto::validate_ephemeral_resource_config::Request>,
    ) -> std::result::Result<Response<proto::validate_ephemeral_resource_config::Response>, Status>
    {
        Ok(Response::new(
            proto::validate_ephemeral_resource_config::Response {
                diagnostics: vec![],
            },
        ))
    }

    async fn open_ephemeral_resource(
        &self,
        _request: Request<proto::open_ephemeral_resource::Request>,
    ) -> std::result::Result<Response<proto::open_ephemeral_resource::Response>, Status> {
        Err(Status::unimplemented(
            "ephemeral resources are not supported by this provider",
        ))
    }

    async fn renew_ephemeral_resource(
        &self,
        _request: Request<proto::renew_ephemeral_resource::Request>,
    ) -> std::result::Result<Response<proto::renew_ephemeral_resource::Response>, Status> {
        Err(Status::unimplemented(
            "ephemeral resources are not supported by this provider",
        ))
    }

    async fn close_ephemeral_resource(
        &self,
        _request: Request<proto::close_ephemeral_resource::Request>,
    ) -> std::result::Result<Response<proto::close_ephemeral_resource::Response>, Status> {
        Err(Status::unimplemented(
            "ephemeral resources are not supported by this provider",
        ))
    }

    async fn get_functions(
        &self,
        _request: Request<proto::get_functions::Request>,
    ) -> std::result::Result<Response<proto::get_functions::Response>, Status> {
        Ok(Response::new(proto::get_functions::Response {
            functions: HashMap::new(),
            diagnostics: vec![],
        }))
    }

    async fn call_function(
        &self,
        _request: Request<proto::call_function::Request>,
    ) -> std::result::Result<Response<proto::call_function::Response>, Status> {
        Err(Status::unimplemented(
            "provider functions are not supported by this provider",
        ))
    }

    async fn stop_provider(
        &self,
        _request: Request<proto::stop_provider::Request>,
    ) -> std::result::Result<Response<proto::stop_provider::Response>, Status> {
        Ok(Response::new(proto::stop_provider::Response {
            error: String::new(),
        }))
    }
}

fn server_capabilities() -> proto::ServerCapabilities {
    proto::ServerCapabilities {
        plan_destroy: false,
        get_provider_schema_optional: false,
        move_resource_state: false,
    }
}

fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics
        .iter()
        .any(|diagnostic| diagnostic.severity == DiagnosticSeverity::Error)
}

fn status_from_error(error: TfplugError) -> Status {
    Status::invalid_argument(error.to_string())
}

fn decode_dynamic(value: &Option<proto::DynamicValue>) -> Result<DynamicValue> {
    match value {
        Some(value) if !value.msgpack.is_empty() => DynamicValue::decode_msgpack(&value.msgpack),
        Some(value) if !value.json.is_empty() => DynamicValue::decode_json(&value.json),
        _ => Ok(DynamicValue::null()),
    }
}

fn encode_dynamic(value: &DynamicValue) -> std::result::Result<proto::DynamicValue, Status> {
    let msgpack = value
        .encode_msgpack()
        .map_err(|error| Status::internal(error.to_string()))?;
    Ok(proto::DynamicValue {
        msgpack,
        json: vec![],
    })
}

/// Schema-level config validation: required attributes present, no unknown
/// attributes, values of the declared type, then per-attribute validators.
fn validate_against_schema(schema: &Schema, config: &DynamicValue) -> Vec<Diagnostic> {
    let mut diagnostics = vec![];

    let config_map = match &config.value {
        Dynamic::Map(map) => map,
        Dynamic::Null | Dynamic::Unknown => return diagnostics,
        other => {
            diagnostics.push(Diagnostic::error(
                "Invalid configuration",
                format!(
                    "Expected a configuration object, got {}",
                    crate::types::type_name(other)
                ),
            ));
            return diagnostics;
        }
    };

    for attribute in &schema.block.attributes {
        let path = AttributePath::new(&attribute.name);
        let value = config_map.get(&attribute.name).unwrap_or(&Dynamic::Null);

        if attribute.required && matches!(value, Dynamic::Null) {
            diagnostics.push(
                Diagnostic::error(
                    "Missing required attribute",
                    format!("The attribute {} is required", attribute.name),
                )
                .with_attribute(path.clone()),
            );
            continue;
        }

        if !value_matches_type(value, &attribute.r#type) {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid attribute type",
                    format!(
                        "The attribute {} must be {}, got {}",
                        attribute.name,
                        type_description(&attribute.r#type),
                        crate::types::type_name(value)
                    ),
                )
                .with_attribute(path.clone()),
            );
            continue;
        }

        if !matches!(value, Dynamic::Null) {
            for validator in &attribute.validators {
                let response = validator.validate(ValidatorRequest {
                    config_value: DynamicValue::new(value.clone()),
                    path: path.clone(),
                });
                diagnostics.extend(response.diagnostics);
            }
        }
    }

    let declared: std::collections::HashSet<&str> = schema
        .block
        .attributes
        .iter()
        .map(|attribute| attribute.name.as_str())
        .chain(
            schema
                .block
                .block_types
                .iter()
                .map(|block| block.type_name.as_str()),
        )
        .collect();
    for name in config_map.keys() {
        if !declared.contains(name.as_str()) {
            diagnostics.push(Diagnostic::error(
                "Unexpected attribute",
                format!("The attribute {name} is not declared in the schema"),
            ));
        }
    }

    diagnostics
}

fn value_matches_type(value: &Dynamic, type_: &AttributeType) -> bool {
    match (value, type_) {
        (Dynamic::Null | Dynamic::Unknown, _) => true,
        (Dynamic::String(_), AttributeType::String) => true,
        (Dynamic::Number(_), AttributeType::Number) => true,
        (Dynamic::Bool(_), AttributeType::Bool) => true,
        (Dynamic::List(items), AttributeType::List(inner) | AttributeType::Set(inner)) => {
            items.iter().all(|item| value_matches_type(item, inner))
        }
        (Dynamic::Map(entries), AttributeType::Map(inner)) => entries
            .values()
            .all(|entry| value_matches_type(entry, inner)),
        (Dynamic::Map(entries), AttributeType::Object(fields)) => {
            entries.iter().all(|(name, entry)| match fields.get(name) {
                Some(field_type) => value_matches_type(entry, field_type),
                None => false,
            })
        }
        _ => false,
    }
}

fn type_description(type_: &AttributeType) -> &'static str {
    match type_ {
        AttributeType::String => "a string",
        AttributeType::Number => "a number",
        AttributeType::Bool => "a bool",
        AttributeType::List(_) => "a list",
        AttributeType::Set(_) => "a set",
        AttributeType::Map(_) => "a map",
        AttributeType::Object(_) => "an object",
    }
}

fn schema_to_proto(schema: &Schema) -> proto::Schema {
    proto::Schema {
        version: schema.version,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn block_to_proto(block: &Block) -> proto::schema::Block {
    proto::schema::Block {
        version: block.version,
        attributes: block.attributes.iter().map(attribute_to_proto).collect(),
        block_types: block
            .block_types
            .iter()
            .map(nested_block_to_proto)
            .collect(),
        description: block.description.clone(),
        description_kind: string_kind_to_proto(block.description_kind) as i32,
        deprecated: block.deprecated,
    }
}

fn attribute_to_proto(attribute: &Attribute) -> proto::schema::Attribute {
    proto::schema::Attribute {
        name: attribute.name.clone(),
        r#type: attribute_type_to_bytes(&attribute.r#type),
        description: attribute.description.clone(),
        required: attribute.required,
        optional: attribute.optional,
        computed: attribute.computed,
        sensitive: attribute.sensitive,
        description_kind: proto::StringKind::Plain as i32,
        deprecated: attribute.deprecated,
        nested_type: None,
        write_only: false,
    }
}

fn nested_block_to_proto(nested: &NestedBlock) -> proto::schema::NestedBlock {
    proto::schema::NestedBlock {
        type_name: nested.type_name.clone(),
        block: Some(block_to_proto(&nested.block)),
        nesting: nesting_mode_to_proto(nested.nesting) as i32,
        min_items: nested.min_items,
        max_items: nested.max_items,
    }
}

fn nesting_mode_to_proto(mode: NestingMode) -> proto::schema::nested_block::NestingMode {
    use proto::schema::nested_block::NestingMode as ProtoNesting;
    match mode {
        NestingMode::Invalid => ProtoNesting::Invalid,
        NestingMode::Single => ProtoNesting::Single,
        NestingMode::List => ProtoNesting::List,
        NestingMode::Set => ProtoNesting::Set,
        NestingMode::Map => ProtoNesting::Map,
        NestingMode::Group => ProtoNesting::Group,
    }
}

fn string_kind_to_proto(kind: StringKind) -> proto::StringKind {
    match kind {
        StringKind::Plain => proto::StringKind::Plain,
        StringKind::Markdown => proto::StringKind::Markdown,
    }
}

/// Serializes an attribute type into Terraform's JSON type notation, e.g.
/// `"string"` or `["list","string"]`.
fn attribute_type_to_bytes(type_: &AttributeType) -> Vec<u8> {
    attribute_type_to_json(type_).to_string().into_bytes()
}

fn attribute_type_to_json(type_: &AttributeType) -> serde_json::Value {
    match type_ {
        AttributeType::String => serde_json::Value::String("string".to_string()),
        AttributeType::Number => serde_json::Value::String("number".to_string()),
        AttributeType::Bool => serde_json::Value::String("bool".to_string()),
        AttributeType::List(inner) => serde_json::json!(["list", attribute_type_to_json(inner)]),
        AttributeType::Set(inner) => serde_json::json!(["set", attribute_type_to_json(inner)]),
        AttributeType::Map(inner) => serde_json::json!(["map", attribute_type_to_json(inner)]),
        AttributeType::Object(fields) => {
            let fields: serde_json::Map<String, serde_json::Value> = fields
                .iter()
                .map(|(name, field_type)| (name.clone(), attribute_type_to_json(field_type)))
                .collect();
            serde_json::json!(["object", fields])
        }
    }
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<proto::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|diagnostic| proto::Diagnostic {
            severity: severity_to_proto(diagnostic.severity) as i32,
            summary: diagnostic.summary,
            detail: diagnostic.detail,
            attribute: diagnostic.attribute.as_ref().map(path_to_proto),
        })
        .collect()
}

fn severity_to_proto(severity: DiagnosticSeverity) -> proto::diagnostic::Severity {
    match severity {
        DiagnosticSeverity::Invalid => proto::diagnostic::Severity::Invalid,
        DiagnosticSeverity::Error => proto::diagnostic::Severity::Error,
        DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning,
    }
}

fn path_to_proto(path: &AttributePath) -> proto::AttributePath {
    use proto::attribute_path::step::Selector;
    proto::AttributePath {
        steps: path
            .steps
            .iter()
            .map(|step| proto::attribute_path::Step {
                selector: Some(match step {
                    AttributePathStep::AttributeName(name) => Selector::AttributeName(name.clone()),
                    AttributePathStep::ElementKeyString(key) => {
                        Selector::ElementKeyString(key.clone())
                    }
                    AttributePathStep::ElementKeyInt(index) => Selector::ElementKeyInt(*index),
                }),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::{
        ConfigureDataSourceResponse, DataSource, DataSourceSchemaResponse, ReadDataSourceResponse,
        ValidateDataSourceConfigResponse,
    };
    use crate::provider::{
        ConfigureProviderResponse, DataSourceFactory, ProviderSchemaResponse, ResourceFactory,
        ValidateProviderConfigResponse,
    };
    use crate::resource::{
        ConfigureResourceResponse, CreateResourceResponse, DeleteResourceResponse,
        ReadResourceResponse, Resource, ResourceSchemaResponse, UpdateResourceResponse,
        ValidateResourceConfigResponse,
    };
    use crate::schema::{AttributeBuilder, SchemaBuilder};
    use async_trait::async_trait;

    struct TestProvider;

    #[async_trait]
    impl Provider for TestProvider {
        fn type_name(&self) -> &str {
            "test"
        }

        async fn schema(
            &self,
            _ctx: Context,
            _request: ProviderSchemaRequest,
        ) -> ProviderSchemaResponse {
            ProviderSchemaResponse {
                schema: SchemaBuilder::new()
                    .attribute(
                        AttributeBuilder::new("endpoint", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .build(),
                diagnostics: vec![],
            }
        }

        async fn validate(
            &self,
            _ctx: Context,
            _request: ValidateProviderConfigRequest,
        ) -> ValidateProviderConfigResponse {
            ValidateProviderConfigResponse {
                diagnostics: vec![],
            }
        }

        async fn configure(
            &mut self,
            _ctx: Context,
            _request: ConfigureProviderRequest,
        ) -> ConfigureProviderResponse {
            ConfigureProviderResponse {
                diagnostics: vec![],
                provider_data: Some(Arc::new("shared".to_string())),
            }
        }

        fn resources(&self) -> HashMap<String, ResourceFactory> {
            let mut resources: HashMap<String, ResourceFactory> = HashMap::new();
            resources.insert(
                "test_widget".to_string(),
                Box::new(|| Box::new(TestResource { configured: false })),
            );
            resources
        }

        fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
            let mut data_sources: HashMap<String, DataSourceFactory> = HashMap::new();
            data_sources.insert(
                "test_widget".to_string(),
                Box::new(|| Box::new(TestDataSource)),
            );
            data_sources
        }
    }

    struct TestResource {
        configured: bool,
    }

    #[async_trait]
    impl Resource for TestResource {
        fn type_name(&self) -> &str {
            "test_widget"
        }

        async fn schema(
            &self,
            _ctx: Context,
            _request: ResourceSchemaRequest,
        ) -> ResourceSchemaResponse {
            ResourceSchemaResponse {
                schema: SchemaBuilder::new()
                    .attribute(
                        AttributeBuilder::new("name", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("id", AttributeType::String)
                            .computed()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("size", AttributeType::Number)
                            .optional()
                            .default(crate::defaults::StaticDefault::number(1.0))
                            .build(),
                    )
                    .build(),
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
            let mut new_state = request.planned_state;
            new_state
                .set_string(&AttributePath::new("id"), "widget-1".to_string())
                .unwrap();
            CreateResourceResponse {
                new_state,
                diagnostics: vec![],
            }
        }

        async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
            ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![],
                private: request.private,
            }
        }

        async fn update(
            &self,
            _ctx: Context,
            request: UpdateResourceRequest,
        ) -> UpdateResourceResponse {
            UpdateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![],
            }
        }

        async fn delete(
            &self,
            _ctx: Context,
            _request: DeleteResourceRequest,
        ) -> DeleteResourceResponse {
            DeleteResourceResponse {
                diagnostics: vec![],
            }
        }
    }

    #[async_trait]
    impl ResourceWithConfigure for TestResource {
        async fn configure(
            &mut self,
            _ctx: Context,
            _request: ConfigureResourceRequest,
        ) -> ConfigureResourceResponse {
            self.configured = true;
            ConfigureResourceResponse {
                diagnostics: vec![],
            }
        }
    }

    struct TestDataSource;

    #[async_trait]
    impl DataSource for TestDataSource {
        fn type_name(&self) -> &str {
            "test_widget"
        }

        async fn schema(
            &self,
            _ctx: Context,
            _request: DataSourceSchemaRequest,
        ) -> DataSourceSchemaResponse {
            DataSourceSchemaResponse {
                schema: SchemaBuilder::new()
                    .attribute(
                        AttributeBuilder::new("name", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .build(),
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

        async fn read(
            &self,
            _ctx: Context,
            request: ReadDataSourceRequest,
        ) -> ReadDataSourceResponse {
            ReadDataSourceResponse {
                state: request.config,
                diagnostics: vec![],
            }
        }
    }

    #[async_trait]
    impl DataSourceWithConfigure for TestDataSource {
        async fn configure(
            &mut self,
            _ctx: Context,
            _request: ConfigureDataSourceRequest,
        ) -> ConfigureDataSourceResponse {
            ConfigureDataSourceResponse {
                diagnostics: vec![],
            }
        }
    }

    fn handler() -> ProviderHandler<TestProvider> {
        ProviderHandler {
            provider: Arc::new(RwLock::new(TestProvider)),
            provider_data: Arc::new(RwLock::new(None)),
        }
    }

    fn config(pairs: &[(&str, Dynamic)]) -> DynamicValue {
        let mut map = HashMap::new();
        for (name, value) in pairs {
            map.insert(name.to_string(), value.clone());
        }
        DynamicValue::new(Dynamic::Map(map))
    }

    fn encoded(value: &DynamicValue) -> Option<proto::DynamicValue> {
        Some(proto::DynamicValue {
            msgpack: value.encode_msgpack().unwrap(),
            json: vec![],
        })
    }

    #[tokio::test]
    async fn get_provider_schema_lists_resources_and_data_sources() {
        let response = handler()
            .get_provider_schema(Request::new(proto::get_provider_schema::Request {}))
            .await
            .unwrap()
            .into_inner();

        assert!(response.provider.is_some());
        assert!(response.resource_schemas.contains_key("test_widget"));
        assert!(response.data_source_schemas.contains_key("test_widget"));
        assert!(response.diagnostics.is_empty());

        let schema = &response.resource_schemas["test_widget"];
        let block = schema.block.as_ref().unwrap();
        let name = block
            .attributes
            .iter()
            .find(|attribute| attribute.name == "name")
            .unwrap();
        assert_eq!(name.r#type, b"\"string\"");
        assert!(name.required);
    }

    #[tokio::test]
    async fn configure_provider_stores_provider_data() {
        let handler = handler();
        let response = handler
            .configure_provider(Request::new(proto::configure_provider::Request {
                terraform_version: "1.9.0".to_string(),
                config: encoded(&config(&[(
                    "endpoint",
                    Dynamic::String("https://10.0.0.1".to_string()),
                )])),
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(response.diagnostics.is_empty());
        assert!(handler.provider_data.read().await.is_some());
    }

    #[tokio::test]
    async fn validate_resource_config_flags_missing_required() {
        let response = handler()
            .validate_resource_config(Request::new(proto::validate_resource_config::Request {
                type_name: "test_widget".to_string(),
                config: encoded(&config(&[])),
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(
            response.diagnostics[0].summary,
            "Missing required attribute"
        );
    }

    #[tokio::test]
    async fn validate_resource_config_flags_wrong_type() {
        let response = handler()
            .validate_resource_config(Request::new(proto::validate_resource_config::Request {
                type_name: "test_widget".to_string(),
                config: encoded(&config(&[("name", Dynamic::Number(7.0))])),
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Invalid attribute type");
    }

    #[tokio::test]
    async fn validate_resource_config_flags_undeclared_attribute() {
        let response = handler()
            .validate_resource_config(Request::new(proto::validate_resource_config::Request {
                type_name: "test_widget".to_string(),
                config: encoded(&config(&[
                    ("name", Dynamic::String("w".to_string())),
                    ("bogus", Dynamic::String("x".to_string())),
                ])),
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Unexpected attribute");
    }

    #[tokio::test]
    async fn plan_fills_defaults_and_marks_computed_unknown() {
        let planned = handler()
            .plan_resource_change(Request::new(proto::plan_resource_change::Request {
                type_name: "test_widget".to_string(),
                prior_state: None,
                proposed_new_state: encoded(&config(&[(
                    "name",
                    Dynamic::String("w".to_string()),
                )])),
                config: encoded(&config(&[("name", Dynamic::String("w".to_string()))])),
                prior_private: vec![],
                provider_meta: None,
                client_capabilities: None,
                prior_identity: None,
            }))
            .await
            .unwrap()
            .into_inner();

        let state = DynamicValue::decode_msgpack(&planned.planned_state.unwrap().msgpack).unwrap();
        assert_eq!(state.get_number(&AttributePath::new("size")).unwrap(), 1.0);
        assert!(state.get_value(&AttributePath::new("id")).is_unknown());
        assert!(planned.requires_replace.is_empty());
    }

    #[tokio::test]
    async fn plan_destroy_keeps_null_state() {
        let planned = handler()
            .plan_resource_change(Request::new(proto::plan_resource_change::Request {
                type_name: "test_widget".to_string(),
                prior_state: encoded(&config(&[("name", Dynamic::String("w".to_string()))])),
                proposed_new_state: None,
                config: None,
                prior_private: vec![],
                provider_meta: None,
                client_capabilities: None,
                prior_identity: None,
            }))
            .await
            .unwrap()
            .into_inner();

        let state = DynamicValue::decode_msgpack(&planned.planned_state.unwrap().msgpack).unwrap();
        assert!(state.is_null());
    }

    #[tokio::test]
    async fn apply_create_returns_new_state() {
        let applied = handler()
            .apply_resource_change(Request::new(proto::apply_resource_change::Request {
                type_name: "test_widget".to_string(),
                prior_state: None,
                planned_state: encoded(&config(&[("name", Dynamic::String("w".to_string()))])),
                config: encoded(&config(&[("name", Dynamic::String("w".to_string()))])),
                planned_private: vec![],
                provider_meta: None,
                planned_identity: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(applied.diagnostics.is_empty());
        let state = DynamicValue::decode_msgpack(&applied.new_state.unwrap().msgpack).unwrap();
        assert_eq!(
            state.get_string(&AttributePath::new("id")).unwrap(),
            "widget-1"
        );
    }

    #[tokio::test]
    async fn apply_delete_returns_null_state() {
        let applied = handler()
            .apply_resource_change(Request::new(proto::apply_resource_change::Request {
                type_name: "test_widget".to_string(),
                prior_state: encoded(&config(&[("name", Dynamic::String("w".to_string()))])),
                planned_state: None,
                config: None,
                planned_private: vec![],
                provider_meta: None,
                planned_identity: None,
            }))
            .await
            .unwrap()
            .into_inner();

        let state = DynamicValue::decode_msgpack(&applied.new_state.unwrap().msgpack).unwrap();
        assert!(state.is_null());
    }

    #[tokio::test]
    async fn read_data_source_returns_state() {
        let response = handler()
            .read_data_source(Request::new(proto::read_data_source::Request {
                type_name: "test_widget".to_string(),
                config: encoded(&config(&[("name", Dynamic::String("w".to_string()))])),
                provider_meta: None,
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();

        let state = DynamicValue::decode_msgpack(&response.state.unwrap().msgpack).unwrap();
        assert_eq!(state.get_string(&AttributePath::new("name")).unwrap(), "w");
    }

    #[tokio::test]
    async fn unknown_resource_type_is_not_found() {
        let error = handler()
            .read_resource(Request::new(proto::read_resource::Request {
                type_name: "test_missing".to_string(),
                current_state: None,
                private: vec![],
                provider_meta: None,
                client_capabilities: None,
                current_identity: None,
            }))
            .await
            .unwrap_err();

        assert_eq!(error.code(), tonic::Code::NotFound);
    }

    #[tokio::test]
    async fn import_without_support_reports_diagnostic() {
        let response = handler()
            .import_resource_state(Request::new(proto::import_resource_state::Request {
                type_name: "test_widget".to_string(),
                id: "widget-1".to_string(),
                client_capabilities: None,
                identity: None,
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(response.imported_resources.is_empty());
        assert_eq!(response.diagnostics[0].summary, "Import not supported");
    }

    #[test]
    fn attribute_types_serialize_to_terraform_notation() {
        assert_eq!(
            attribute_type_to_bytes(&AttributeType::String),
            b"\"string\""
        );
        assert_eq!(
            attribute_type_to_bytes(&AttributeType::List(Box::new(AttributeType::Number))),
            b"[\"list\",\"number\"]"
        );
        let mut fields = HashMap::new();
        fields.insert("cidr".to_string(), AttributeType::String);
        assert_eq!(
            attribute_type_to_bytes(&AttributeType::Object(fields)),
            b"[\"object\",{\"cidr\":\"string\"}]"
        );
    }

    #[test]
    fn server_defaults_to_plaintext() {
        let server = ProviderServer::new(TestProvider);
        assert!(server.tls_identity.is_none());

        let server = server.with_tls(PathBuf::from("cert.pem"), PathBuf::from("key.pem"));
        assert!(server.tls_identity.is_some());
    }
}
