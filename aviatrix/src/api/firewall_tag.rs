//! Named CIDR tags referenced by firewall rules.

use serde::{Deserialize, Serialize};

use super::client::Client;
use super::error::ApiError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CidrMember {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cidr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FirewallTagDetail {
    #[serde(default)]
    pub tag_name: String,
    #[serde(default, rename = "members")]
    pub cidr_list: Vec<CidrMember>,
}

impl Client {
    pub async fn create_firewall_tag(&self, tag_name: &str) -> Result<(), ApiError> {
        self.post_api("add_policy_tag", &[("tag_name", tag_name.to_string())])
            .await
    }

    /// Replaces the member list. Encoded as a JSON array in the
    /// `new_policies` form field.
    pub async fn update_firewall_tag_members(
        &self,
        tag_name: &str,
        members: &[CidrMember],
    ) -> Result<(), ApiError> {
        let new_policies =
            serde_json::to_string(members).map_err(|e| ApiError::ParseError {
                action: "update_policy_members".to_string(),
                message: e.to_string(),
            })?;
        self.post_api(
            "update_policy_members",
            &[
                ("tag_name", tag_name.to_string()),
                ("new_policies", new_policies),
            ],
        )
        .await
    }

    pub async fn get_firewall_tag(&self, tag_name: &str) -> Result<FirewallTagDetail, ApiError> {
        self.post_api_with_results("list_policy_members", &[("tag_name", tag_name.to_string())])
            .await
    }

    pub async fn delete_firewall_tag(&self, tag_name: &str) -> Result<(), ApiError> {
        self.post_api("del_policy_tag", &[("tag_name", tag_name.to_string())])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn members_encode_as_new_policies_json() {
        let members = vec![CidrMember {
            name: "office".to_string(),
            cidr: "192.0.2.0/24".to_string(),
        }];
        let encoded = serde_json::to_string(&members).unwrap();
        assert_eq!(encoded, r#"[{"name":"office","cidr":"192.0.2.0/24"}]"#);
    }

    #[test]
    fn tag_detail_decodes_members() {
        let detail: FirewallTagDetail = serde_json::from_str(
            r#"{"tag_name": "tag-1", "members": [{"name": "office", "cidr": "192.0.2.0/24"}]}"#,
        )
        .unwrap();
        assert_eq!(detail.cidr_list[0].name, "office");
    }
}
