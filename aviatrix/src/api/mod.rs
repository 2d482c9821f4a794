//! Controller REST client and typed per-feature actions.

pub mod account;
pub mod client;
pub mod error;
pub mod external_device_conn;
pub mod firewall;
pub mod firewall_tag;
pub mod gateway;
pub mod response;
pub mod spoke_gateway;
pub mod spoke_transit_attachment;
pub mod transit_gateway;

pub use account::{AccountRequest, AccountSummary, CLOUD_TYPE_AWS, CLOUD_TYPE_GCP};
pub use client::Client;
pub use error::ApiError;
pub use external_device_conn::{ExternalDeviceConnDetail, ExternalDeviceConnRequest};
pub use firewall::{FirewallDetail, FirewallPolicy};
pub use firewall_tag::{CidrMember, FirewallTagDetail};
pub use gateway::{GatewayDetail, HaGateway};
pub use spoke_gateway::SpokeGatewayRequest;
pub use transit_gateway::{TransitAdvancedConfig, TransitGatewayRequest};
