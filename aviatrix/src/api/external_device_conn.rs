//! BGP/static connections from a transit gateway to an external device.

use serde::Deserialize;

use super::client::Client;
use super::error::ApiError;

pub const PHASE1_AUTH_DEFAULT: &str = "SHA-256";
pub const PHASE1_DH_GROUP_DEFAULT: &str = "14";
pub const PHASE1_ENCRYPTION_DEFAULT: &str = "AES-256-CBC";
pub const PHASE2_AUTH_DEFAULT: &str = "HMAC-SHA-256";
pub const PHASE2_DH_GROUP_DEFAULT: &str = "14";
pub const PHASE2_ENCRYPTION_DEFAULT: &str = "AES-256-CBC";

#[derive(Debug, Clone, Default)]
pub struct ExternalDeviceConnRequest {
    pub vpc_id: String,
    pub connection_name: String,
    pub gw_name: String,
    /// "bgp" or "static".
    pub routing_protocol: String,
    pub bgp_local_as_number: i64,
    pub bgp_remote_as_number: i64,
    pub remote_gateway_ip: String,
    pub remote_subnet: String,
    pub direct_connect: bool,
    pub pre_shared_key: String,
    pub local_tunnel_cidr: String,
    pub remote_tunnel_cidr: String,
    pub phase1_authentication: String,
    pub phase1_dh_groups: String,
    pub phase1_encryption: String,
    pub phase2_authentication: String,
    pub phase2_dh_groups: String,
    pub phase2_encryption: String,
    pub enable_ha: bool,
}

impl ExternalDeviceConnRequest {
    fn form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("vpc_id", self.vpc_id.clone()),
            ("connection_name", self.connection_name.clone()),
            ("transit_gw", self.gw_name.clone()),
            ("routing_protocol", self.routing_protocol.clone()),
            ("external_device_ip_address", self.remote_gateway_ip.clone()),
        ];
        if self.routing_protocol == "bgp" {
            form.push(("bgp_local_as_number", self.bgp_local_as_number.to_string()));
            form.push((
                "external_device_as_number",
                self.bgp_remote_as_number.to_string(),
            ));
        } else if !self.remote_subnet.is_empty() {
            form.push(("remote_subnet", self.remote_subnet.clone()));
        }
        if self.direct_connect {
            form.push(("direct_connect", "true".to_string()));
        }
        if self.enable_ha {
            form.push(("enable_ha", "true".to_string()));
        }
        for (name, value) in [
            ("pre_shared_key", &self.pre_shared_key),
            ("local_tunnel_ip", &self.local_tunnel_cidr),
            ("remote_tunnel_ip", &self.remote_tunnel_cidr),
            ("phase1_auth", &self.phase1_authentication),
            ("phase1_dh_group", &self.phase1_dh_groups),
            ("phase1_encryption", &self.phase1_encryption),
            ("phase2_auth", &self.phase2_authentication),
            ("phase2_dh_group", &self.phase2_dh_groups),
            ("phase2_encryption", &self.phase2_encryption),
        ] {
            if !value.is_empty() {
                form.push((name, value.clone()));
            }
        }
        form
    }
}

/// Read-back of a connection, already normalized: default phase1/phase2
/// algorithms collapse to empty strings so they never land in state.
#[derive(Debug, Clone, Default)]
pub struct ExternalDeviceConnDetail {
    pub gw_name: String,
    pub routing_protocol: String,
    pub remote_gateway_ip: String,
    pub remote_subnet: String,
    pub bgp_local_as_number: String,
    pub bgp_remote_as_number: String,
    pub ha_enabled: bool,
    pub custom_algorithms: bool,
    pub phase1_authentication: String,
    pub phase1_dh_groups: String,
    pub phase1_encryption: String,
    pub phase2_authentication: String,
    pub phase2_dh_groups: String,
    pub phase2_encryption: String,
}

#[derive(Debug, Default, Deserialize)]
struct ConnDetailResults {
    #[serde(default)]
    connections: RawConnDetail,
}

#[derive(Debug, Default, Deserialize)]
struct RawConnDetail {
    #[serde(default, rename = "name")]
    conn_name: Vec<String>,
    #[serde(default, rename = "type")]
    conn_type: String,
    #[serde(default)]
    gw_name: String,
    #[serde(default)]
    tunnels: Vec<TunnelInfo>,
    #[serde(default, rename = "remote_cidr")]
    remote_subnet: String,
    #[serde(default, rename = "ha_status")]
    ha_enabled: String,
    #[serde(default, rename = "bgp_local_asn_number")]
    bgp_local_asn: String,
    #[serde(default, rename = "bgp_remote_asn_number")]
    bgp_remote_asn: String,
    #[serde(default)]
    algorithm: AlgorithmInfo,
}

#[derive(Debug, Default, Deserialize)]
struct TunnelInfo {
    #[serde(default)]
    peer_ip: String,
    #[serde(default)]
    gw_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct AlgorithmInfo {
    #[serde(default, rename = "ph1_auth")]
    phase1_auth: Vec<String>,
    #[serde(default, rename = "ph1_dh")]
    phase1_dh: Vec<String>,
    #[serde(default, rename = "ph1_encr")]
    phase1_encr: Vec<String>,
    #[serde(default, rename = "ph2_auth")]
    phase2_auth: Vec<String>,
    #[serde(default, rename = "ph2_dh")]
    phase2_dh: Vec<String>,
    #[serde(default, rename = "ph2_encr")]
    phase2_encr: Vec<String>,
}

impl AlgorithmInfo {
    fn first(values: &[String]) -> &str {
        values.first().map(String::as_str).unwrap_or("")
    }

    fn is_default(&self) -> bool {
        Self::first(&self.phase1_auth) == PHASE1_AUTH_DEFAULT
            && Self::first(&self.phase1_dh) == PHASE1_DH_GROUP_DEFAULT
            && Self::first(&self.phase1_encr) == PHASE1_ENCRYPTION_DEFAULT
            && Self::first(&self.phase2_auth) == PHASE2_AUTH_DEFAULT
            && Self::first(&self.phase2_dh) == PHASE2_DH_GROUP_DEFAULT
            && Self::first(&self.phase2_encr) == PHASE2_ENCRYPTION_DEFAULT
    }
}

impl Client {
    pub async fn create_external_device_conn(
        &self,
        conn: &ExternalDeviceConnRequest,
    ) -> Result<(), ApiError> {
        self.post_api("connect_transit_gw_to_external_device", &conn.form())
            .await
    }

    pub async fn get_external_device_conn(
        &self,
        vpc_id: &str,
        connection_name: &str,
    ) -> Result<ExternalDeviceConnDetail, ApiError> {
        let results: ConnDetailResults = self
            .get_api(
                "get_site2cloud_conn_detail",
                &[
                    ("vpc_id", vpc_id.to_string()),
                    ("conn_name", connection_name.to_string()),
                ],
            )
            .await?;
        let raw = results.connections;
        if raw.conn_name.is_empty() {
            return Err(ApiError::NotFound);
        }

        let mut detail = ExternalDeviceConnDetail {
            gw_name: raw.gw_name.clone(),
            routing_protocol: raw.conn_type.clone(),
            remote_subnet: raw.remote_subnet.clone(),
            bgp_local_as_number: raw.bgp_local_asn.clone(),
            bgp_remote_as_number: raw.bgp_remote_asn.clone(),
            ha_enabled: raw.ha_enabled == "enabled",
            ..Default::default()
        };
        if let Some(tunnel) = raw.tunnels.iter().find(|t| t.gw_name == raw.gw_name) {
            detail.remote_gateway_ip = tunnel.peer_ip.clone();
        }
        if !raw.algorithm.is_default() {
            detail.custom_algorithms = true;
            detail.phase1_authentication = AlgorithmInfo::first(&raw.algorithm.phase1_auth).to_string();
            detail.phase1_dh_groups = AlgorithmInfo::first(&raw.algorithm.phase1_dh).to_string();
            detail.phase1_encryption = AlgorithmInfo::first(&raw.algorithm.phase1_encr).to_string();
            detail.phase2_authentication = AlgorithmInfo::first(&raw.algorithm.phase2_auth).to_string();
            detail.phase2_dh_groups = AlgorithmInfo::first(&raw.algorithm.phase2_dh).to_string();
            detail.phase2_encryption = AlgorithmInfo::first(&raw.algorithm.phase2_encr).to_string();
        }
        Ok(detail)
    }

    pub async fn delete_external_device_conn(
        &self,
        vpc_id: &str,
        connection_name: &str,
    ) -> Result<(), ApiError> {
        self.post_api(
            "disconnect_transit_gw",
            &[
                ("vpc_id", vpc_id.to_string()),
                ("connection_name", connection_name.to_string()),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgp_form_carries_as_numbers_not_remote_subnet() {
        let conn = ExternalDeviceConnRequest {
            vpc_id: "vpc-abc".to_string(),
            connection_name: "conn-1".to_string(),
            gw_name: "transit-1".to_string(),
            routing_protocol: "bgp".to_string(),
            bgp_local_as_number: 65001,
            bgp_remote_as_number: 65002,
            remote_gateway_ip: "203.0.113.10".to_string(),
            remote_subnet: "10.9.0.0/16".to_string(),
            ..Default::default()
        };
        let form = conn.form();
        assert!(form
            .iter()
            .any(|(k, v)| *k == "bgp_local_as_number" && v == "65001"));
        assert!(!form.iter().any(|(k, _)| *k == "remote_subnet"));
    }

    #[test]
    fn default_algorithms_are_not_reported_as_custom() {
        let raw = serde_json::from_str::<ConnDetailResults>(
            r#"{"connections": {
                "name": ["conn-1"],
                "type": "bgp",
                "gw_name": "transit-1",
                "algorithm": {
                    "ph1_auth": ["SHA-256"], "ph1_dh": ["14"], "ph1_encr": ["AES-256-CBC"],
                    "ph2_auth": ["HMAC-SHA-256"], "ph2_dh": ["14"], "ph2_encr": ["AES-256-CBC"]
                }
            }}"#,
        )
        .unwrap();
        assert!(raw.connections.algorithm.is_default());
    }

    #[test]
    fn non_default_algorithms_are_custom() {
        let algorithm = AlgorithmInfo {
            phase1_auth: vec!["SHA-1".to_string()],
            ..Default::default()
        };
        assert!(!algorithm.is_default());
    }
}
