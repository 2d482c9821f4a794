//! Stateful firewall policies on a gateway.

use serde::{Deserialize, Serialize};

use super::client::Client;
use super::error::ApiError;

/// One access rule. `deny_allow` and `log_enable` stay as the controller's
/// wire strings ("allow"/"deny", "on"/"off").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirewallPolicy {
    #[serde(default)]
    pub s_ip: String,
    #[serde(default)]
    pub d_ip: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub deny_allow: String,
    #[serde(default)]
    pub log_enable: String,
    #[serde(default)]
    pub description: String,
}

impl FirewallPolicy {
    /// Identity of a rule for reconciling controller order against config
    /// order.
    pub fn key(&self) -> String {
        format!("{}~{}~{}~{}", self.s_ip, self.d_ip, self.protocol, self.port)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FirewallDetail {
    #[serde(default)]
    pub base_policy: String,
    #[serde(default)]
    pub base_policy_log_enable: String,
    #[serde(default)]
    pub security_rules: Vec<FirewallPolicy>,
}

impl Client {
    pub async fn set_base_policy(
        &self,
        gw_name: &str,
        base_policy: &str,
        log_enabled: bool,
    ) -> Result<(), ApiError> {
        let log_flag = if log_enabled { "on" } else { "off" };
        let params = [
            ("vpc_name", gw_name.to_string()),
            ("base_policy", base_policy.to_string()),
            ("base_policy_log_enable", log_flag.to_string()),
        ];
        let _: serde_json::Value = self.get_api("set_vpc_base_policy", &params).await?;
        Ok(())
    }

    /// Replaces the whole rule list. An empty list must serialize as `[]`,
    /// not be omitted.
    pub async fn update_firewall_policies(
        &self,
        gw_name: &str,
        policies: &[FirewallPolicy],
    ) -> Result<(), ApiError> {
        let new_policy =
            serde_json::to_string(policies).map_err(|e| ApiError::ParseError {
                action: "update_access_policy".to_string(),
                message: e.to_string(),
            })?;
        self.post_api(
            "update_access_policy",
            &[
                ("vpc_name", gw_name.to_string()),
                ("new_policy", new_policy),
            ],
        )
        .await
    }

    pub async fn get_firewall(&self, gw_name: &str) -> Result<FirewallDetail, ApiError> {
        self.get_api("vpc_access_policy", &[("vpc_name", gw_name.to_string())])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_key_joins_match_fields() {
        let policy = FirewallPolicy {
            s_ip: "10.0.0.0/24".to_string(),
            d_ip: "10.1.0.0/24".to_string(),
            protocol: "tcp".to_string(),
            port: "443".to_string(),
            ..Default::default()
        };
        assert_eq!(policy.key(), "10.0.0.0/24~10.1.0.0/24~tcp~443");
    }

    #[test]
    fn empty_policy_list_serializes_as_empty_array() {
        let encoded = serde_json::to_string(&Vec::<FirewallPolicy>::new()).unwrap();
        assert_eq!(encoded, "[]");
    }

    #[test]
    fn firewall_detail_decodes_security_rules() {
        let detail: FirewallDetail = serde_json::from_str(
            r#"{
                "base_policy": "deny-all",
                "base_policy_log_enable": "off",
                "security_rules": [
                    {"s_ip": "10.0.0.0/24", "d_ip": "10.1.0.0/24", "protocol": "tcp",
                     "port": "443", "deny_allow": "allow", "log_enable": "on"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(detail.security_rules.len(), 1);
        assert_eq!(detail.security_rules[0].deny_allow, "allow");
    }
}
