//! Transit gateway launch and BGP tuning actions.

use serde::Deserialize;

use super::account::CLOUD_TYPE_GCP;
use super::client::Client;
use super::error::ApiError;

#[derive(Debug, Clone, Default)]
pub struct TransitGatewayRequest {
    pub account_name: String,
    pub cloud_type: i64,
    pub gw_name: String,
    pub gw_size: String,
    pub vpc_id: String,
    pub vpc_region: String,
    pub subnet: String,
    pub insane_mode: bool,
    pub connected_transit: bool,
    pub zone: String,
    pub eip: String,
}

impl TransitGatewayRequest {
    fn form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("account_name", self.account_name.clone()),
            ("cloud_type", self.cloud_type.to_string()),
            ("gw_name", self.gw_name.clone()),
            ("gw_size", self.gw_size.clone()),
            ("vpc_id", self.vpc_id.clone()),
            ("vpc_region", self.vpc_region.clone()),
            ("gw_subnet", self.subnet.clone()),
        ];
        if self.insane_mode {
            form.push(("insane_mode", "on".to_string()));
        }
        if self.connected_transit {
            form.push(("connected_transit", "yes".to_string()));
        }
        if !self.zone.is_empty() {
            form.push(("zone", self.zone.clone()));
        }
        if !self.eip.is_empty() {
            form.push(("eip", self.eip.clone()));
        }
        form
    }
}

/// `list_aviatrix_transit_advanced_config` results, normalized: the
/// controller reports the prepend AS path space-joined and ECMP as a
/// yes/no string.
#[derive(Debug, Clone, Default)]
pub struct TransitAdvancedConfig {
    pub bgp_polling_time: i64,
    pub prepend_as_path: Vec<String>,
    pub local_as_number: String,
    pub bgp_ecmp: bool,
    pub learned_cidrs_approval: bool,
    pub bgp_hold_time: i64,
}

#[derive(Debug, Default, Deserialize)]
struct AdvancedConfigResults {
    #[serde(default)]
    bgp_polling_time: i64,
    #[serde(default)]
    bgp_prepend_as_path: String,
    #[serde(default)]
    local_asn_num: String,
    #[serde(default)]
    bgp_ecmp: String,
    #[serde(default)]
    learned_cidrs_approval: String,
    #[serde(default)]
    bgp_hold_time: i64,
}

impl Client {
    pub async fn create_transit_gateway(
        &self,
        gateway: &TransitGatewayRequest,
    ) -> Result<(), ApiError> {
        self.post_api("create_multicloud_primary_gateway", &gateway.form())
            .await
    }

    /// Launches the HA peer. AWS and Azure place it by subnet, GCP by zone.
    pub async fn enable_transit_ha(
        &self,
        gw_name: &str,
        cloud_type: i64,
        ha_subnet: &str,
        ha_zone: &str,
        eip: &str,
    ) -> Result<(), ApiError> {
        let mut form = vec![("gw_name", gw_name.to_string())];
        if cloud_type == CLOUD_TYPE_GCP {
            form.push(("new_zone", ha_zone.to_string()));
        } else {
            form.push(("public_subnet", ha_subnet.to_string()));
        }
        if !eip.is_empty() {
            form.push(("eip", eip.to_string()));
        }
        self.post_api_allowing("create_multicloud_ha_gateway", &form, &["HA GW already exists"])
            .await
    }

    pub async fn enable_connected_transit(&self, gw_name: &str) -> Result<(), ApiError> {
        self.post_api(
            "enable_connected_transit_on_gateway",
            &[("gateway_name", gw_name.to_string())],
        )
        .await
    }

    pub async fn disable_connected_transit(&self, gw_name: &str) -> Result<(), ApiError> {
        self.post_api(
            "disable_connected_transit_on_gateway",
            &[("gateway_name", gw_name.to_string())],
        )
        .await
    }

    pub async fn set_bgp_polling_time(&self, gw_name: &str, seconds: i64) -> Result<(), ApiError> {
        self.post_api(
            "change_bgp_polling_time",
            &[
                ("gateway_name", gw_name.to_string()),
                ("bgp_polling_time", seconds.to_string()),
            ],
        )
        .await
    }

    pub async fn set_bgp_hold_time(&self, gw_name: &str, seconds: i64) -> Result<(), ApiError> {
        self.post_api(
            "change_bgp_hold_time",
            &[
                ("gateway_name", gw_name.to_string()),
                ("bgp_hold_time", seconds.to_string()),
            ],
        )
        .await
    }

    pub async fn set_local_as_number(&self, gw_name: &str, asn: &str) -> Result<(), ApiError> {
        self.post_api_allowing(
            "edit_transit_local_as_number",
            &[
                ("gateway_name", gw_name.to_string()),
                ("local_as_num", asn.to_string()),
            ],
            &["No change on transit gateway"],
        )
        .await
    }

    pub async fn set_prepend_as_path(
        &self,
        gw_name: &str,
        as_path: &[String],
    ) -> Result<(), ApiError> {
        self.post_api(
            "edit_aviatrix_transit_advanced_config",
            &[
                ("subaction", "prepend_as_path".to_string()),
                ("gateway_name", gw_name.to_string()),
                ("bgp_prepend_as_path", as_path.join(" ")),
            ],
        )
        .await
    }

    pub async fn enable_bgp_ecmp(&self, gw_name: &str) -> Result<(), ApiError> {
        self.post_api("enable_bgp_ecmp", &[("gateway_name", gw_name.to_string())])
            .await
    }

    pub async fn disable_bgp_ecmp(&self, gw_name: &str) -> Result<(), ApiError> {
        self.post_api("disable_bgp_ecmp", &[("gateway_name", gw_name.to_string())])
            .await
    }

    pub async fn enable_learned_cidrs_approval(&self, gw_name: &str) -> Result<(), ApiError> {
        self.post_api(
            "enable_bgp_gateway_cidr_approval",
            &[("gateway_name", gw_name.to_string())],
        )
        .await
    }

    pub async fn disable_learned_cidrs_approval(&self, gw_name: &str) -> Result<(), ApiError> {
        self.post_api(
            "disable_bgp_gateway_cidr_approval",
            &[("gateway_name", gw_name.to_string())],
        )
        .await
    }

    pub async fn get_transit_advanced_config(
        &self,
        gw_name: &str,
    ) -> Result<TransitAdvancedConfig, ApiError> {
        let results: AdvancedConfigResults = self
            .get_api(
                "list_aviatrix_transit_advanced_config",
                &[("gateway_name", gw_name.to_string())],
            )
            .await?;
        Ok(TransitAdvancedConfig {
            bgp_polling_time: results.bgp_polling_time,
            prepend_as_path: results
                .bgp_prepend_as_path
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            local_as_number: results.local_asn_num,
            bgp_ecmp: results.bgp_ecmp == "yes",
            learned_cidrs_approval: results.learned_cidrs_approval == "yes",
            bgp_hold_time: results.bgp_hold_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_form_uses_wire_flag_strings() {
        let gateway = TransitGatewayRequest {
            account_name: "acc".to_string(),
            cloud_type: 1,
            gw_name: "transit-1".to_string(),
            gw_size: "t3.medium".to_string(),
            vpc_id: "vpc-abc".to_string(),
            vpc_region: "us-west-2".to_string(),
            subnet: "10.0.0.0/24".to_string(),
            insane_mode: true,
            connected_transit: true,
            ..Default::default()
        };
        let form = gateway.form();
        assert!(form.iter().any(|(k, v)| *k == "insane_mode" && v == "on"));
        assert!(form
            .iter()
            .any(|(k, v)| *k == "connected_transit" && v == "yes"));
        assert!(!form.iter().any(|(k, _)| *k == "zone"));
    }

    #[test]
    fn advanced_config_normalizes_prepend_path_and_ecmp() {
        let raw: AdvancedConfigResults = serde_json::from_str(
            r#"{
                "bgp_polling_time": 50,
                "bgp_prepend_as_path": "65001 65001 ",
                "local_asn_num": "65001",
                "bgp_ecmp": "yes",
                "bgp_hold_time": 180
            }"#,
        )
        .unwrap();
        let path: Vec<String> = raw
            .bgp_prepend_as_path
            .split_whitespace()
            .map(str::to_string)
            .collect();
        assert_eq!(path, vec!["65001".to_string(), "65001".to_string()]);
        assert_eq!(raw.bgp_ecmp, "yes");
    }
}
