//! Generated protocol types for Terraform Plugin Protocol v6.9
//!
//! tonic_build compiles `proto/tfplugin6.proto` at build time; this module
//! includes the output. RPC request/response pairs live in snake_case
//! modules (`get_provider_schema::Request`), nested messages in sub-modules
//! (`diagnostic::Severity`), and the service trait is
//! `provider_server::Provider`.
//!
//! Several generated types share names with framework types (DynamicValue,
//! Diagnostic, AttributePath, Schema). Always refer to the generated ones
//! through the `proto::` prefix.

include!(concat!(env!("OUT_DIR"), "/tfplugin6.rs"));

pub use provider_server::{Provider as ProviderService, ProviderServer};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proto_types_accessible() {
        let _ = DynamicValue::default();
        let _ = Diagnostic::default();
        let _ = AttributePath::default();
        let _ = ServerCapabilities::default();
        let _ = ClientCapabilities::default();
    }

    #[test]
    fn nested_types_accessible() {
        let _ = diagnostic::Severity::Invalid;
        let _ = attribute_path::step::Selector::AttributeName("test".to_string());
        let _ = schema::nested_block::NestingMode::Single;
    }

    #[test]
    fn request_response_types_accessible() {
        let _ = get_provider_schema::Request::default();
        let _ = get_provider_schema::Response::default();
        let _ = read_resource::Request::default();
        let _ = read_resource::Response::default();
    }
}
