//! Spoke gateway launch actions.

use super::account::CLOUD_TYPE_GCP;
use super::client::Client;
use super::error::ApiError;

#[derive(Debug, Clone, Default)]
pub struct SpokeGatewayRequest {
    pub account_name: String,
    pub cloud_type: i64,
    pub gw_name: String,
    pub gw_size: String,
    pub vpc_id: String,
    pub vpc_region: String,
    pub subnet: String,
    pub insane_mode: bool,
    pub zone: String,
    pub eip: String,
}

impl SpokeGatewayRequest {
    fn form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("account_name", self.account_name.clone()),
            ("cloud_type", self.cloud_type.to_string()),
            ("gw_name", self.gw_name.clone()),
            ("gw_size", self.gw_size.clone()),
            ("vpc_id", self.vpc_id.clone()),
            ("region", self.vpc_region.clone()),
            ("public_subnet", self.subnet.clone()),
        ];
        if self.insane_mode {
            form.push(("insane_mode", "on".to_string()));
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

impl Client {
    pub async fn create_spoke_gateway(
        &self,
        gateway: &SpokeGatewayRequest,
    ) -> Result<(), ApiError> {
        self.post_api("create_spoke_gw", &gateway.form()).await
    }

    /// Launches the HA peer. AWS and Azure place it by subnet, GCP by zone.
    pub async fn enable_spoke_ha(
        &self,
        gw_name: &str,
        cloud_type: i64,
        ha_subnet: &str,
        ha_zone: &str,
        eip: &str,
    ) -> Result<(), ApiError> {
        let mut form = vec![
            ("gw_name", gw_name.to_string()),
            ("eip", eip.to_string()),
        ];
        if cloud_type == CLOUD_TYPE_GCP {
            form.push(("new_zone", ha_zone.to_string()));
        } else {
            form.push(("public_subnet", ha_subnet.to_string()));
        }
        self.post_api_allowing("enable_spoke_ha", &form, &["HA GW already exists"])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spoke_form_uses_region_and_public_subnet_names() {
        let gateway = SpokeGatewayRequest {
            account_name: "acc".to_string(),
            cloud_type: 4,
            gw_name: "spoke-1".to_string(),
            gw_size: "n1-standard-1".to_string(),
            vpc_id: "my-vpc".to_string(),
            vpc_region: "us-west1".to_string(),
            subnet: "10.1.0.0/24".to_string(),
            zone: "us-west1-b".to_string(),
            ..Default::default()
        };
        let form = gateway.form();
        assert!(form.iter().any(|(k, v)| *k == "region" && v == "us-west1"));
        assert!(form
            .iter()
            .any(|(k, v)| *k == "public_subnet" && v == "10.1.0.0/24"));
        assert!(form.iter().any(|(k, v)| *k == "zone" && v == "us-west1-b"));
    }
}
