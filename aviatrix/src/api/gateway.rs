//! Gateway queries and operations shared by transit and spoke gateways.

use serde::Deserialize;

use super::client::Client;
use super::error::ApiError;

/// Gateway description returned by `get_gateway_info`.
///
/// The controller reuses field names across object kinds: the gateway name
/// arrives as `vpc_name` and the instance size as `vpc_size`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayDetail {
    #[serde(default, rename = "vpc_name")]
    pub gw_name: String,
    #[serde(default)]
    pub account_name: String,
    #[serde(default)]
    pub cloud_type: i64,
    #[serde(default)]
    pub vpc_id: String,
    #[serde(default)]
    pub vpc_region: String,
    #[serde(default, rename = "vpc_size")]
    pub gw_size: String,
    #[serde(default, rename = "public_subnet")]
    pub subnet: String,
    #[serde(default)]
    pub public_ip: String,
    #[serde(default)]
    pub private_ip: String,
    #[serde(default)]
    pub zone: String,
    /// "enabled" / "disabled".
    #[serde(default, rename = "single_az_ha")]
    pub single_az: String,
    /// "yes" / "no".
    #[serde(default)]
    pub connected_transit: String,
    /// "yes" / "no".
    #[serde(default, rename = "high_perf")]
    pub insane_mode: String,
    #[serde(default, rename = "bgp_enabled")]
    pub enable_bgp: bool,
    /// Comma-separated transit gateway names a spoke is attached to.
    #[serde(default)]
    pub transit_gw_name: String,
    #[serde(default, rename = "hagw_details")]
    pub ha_gw: Option<HaGateway>,
}

impl GatewayDetail {
    /// The HA peer, when one actually exists. The controller sometimes sends
    /// an empty `hagw_details` object instead of omitting it.
    pub fn ha_gateway(&self) -> Option<&HaGateway> {
        self.ha_gw.as_ref().filter(|ha| !ha.gw_name.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HaGateway {
    #[serde(default, rename = "vpc_name")]
    pub gw_name: String,
    #[serde(default)]
    pub cloud_type: i64,
    #[serde(default, rename = "vpc_size")]
    pub gw_size: String,
    #[serde(default, rename = "public_subnet")]
    pub subnet: String,
    #[serde(default)]
    pub public_ip: String,
    #[serde(default)]
    pub private_ip: String,
}

impl Client {
    pub async fn get_gateway_info(&self, gateway_name: &str) -> Result<GatewayDetail, ApiError> {
        let detail: GatewayDetail = self
            .get_api(
                "get_gateway_info",
                &[("gateway_name", gateway_name.to_string())],
            )
            .await?;
        // The controller answers a stale query with a different gateway.
        if detail.gw_name != gateway_name {
            return Err(ApiError::NotFound);
        }
        Ok(detail)
    }

    pub async fn enable_single_az_ha(&self, gateway_name: &str) -> Result<(), ApiError> {
        self.post_api(
            "enable_single_az_ha",
            &[("gateway_name", gateway_name.to_string())],
        )
        .await
    }

    pub async fn disable_single_az_ha(&self, gateway_name: &str) -> Result<(), ApiError> {
        self.post_api(
            "disable_single_az_ha",
            &[("gateway_name", gateway_name.to_string())],
        )
        .await
    }

    /// Deletes a transit or spoke gateway. Long-running on the controller, so
    /// this runs as an async task.
    pub async fn delete_gateway(&self, gateway_name: &str) -> Result<(), ApiError> {
        self.post_async_api(
            "delete_multicloud_gateway",
            &[
                ("gateway_name", gateway_name.to_string()),
                ("async", "true".to_string()),
            ],
        )
        .await
    }
}
