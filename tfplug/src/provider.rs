//! Provider trait and factory types
//!
//! A provider declares its own configuration schema, configures itself once
//! per Terraform session, and hands out factories for its resources and data
//! sources. Resources are created on demand per RPC and receive the shared
//! provider data through their `configure` hook.

use crate::context::Context;
use crate::data_source::DataSourceWithConfigure;
use crate::resource::ResourceWithConfigure;
use crate::schema::Schema;
use crate::types::{Diagnostic, DynamicValue};
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Creates a fresh resource instance for each RPC.
pub type ResourceFactory = Box<dyn Fn() -> Box<dyn ResourceWithConfigure> + Send + Sync>;

/// Creates a fresh data source instance for each RPC.
pub type DataSourceFactory = Box<dyn Fn() -> Box<dyn DataSourceWithConfigure> + Send + Sync>;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider type name, e.g. "aviatrix". Used as the prefix of all
    /// resource and data source type names.
    fn type_name(&self) -> &str;

    /// Schema of the provider's own configuration block.
    async fn schema(&self, ctx: Context, request: ProviderSchemaRequest)
        -> ProviderSchemaResponse;

    /// Called before configure to validate the provider configuration.
    async fn validate(
        &self,
        ctx: Context,
        request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse;

    /// Called once with the final provider configuration. The returned
    /// `provider_data` is handed to every resource and data source via their
    /// configure hooks; downcast it to the provider's concrete type there.
    async fn configure(
        &mut self,
        ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse;

    /// Resource factories keyed by type name.
    fn resources(&self) -> HashMap<String, ResourceFactory>;

    /// Data source factories keyed by type name.
    fn data_sources(&self) -> HashMap<String, DataSourceFactory>;
}

pub struct ProviderSchemaRequest;

pub struct ProviderSchemaResponse {
    pub schema: Schema,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ValidateProviderConfigRequest {
    pub config: DynamicValue,
}

pub struct ValidateProviderConfigResponse {
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ConfigureProviderRequest {
    pub terraform_version: String,
    pub config: DynamicValue,
}

pub struct ConfigureProviderResponse {
    pub diagnostics: Vec<Diagnostic>,
    /// Shared state (typically an API client) passed to resources and data
    /// sources when they are configured.
    pub provider_data: Option<Arc<dyn Any + Send + Sync>>,
}
