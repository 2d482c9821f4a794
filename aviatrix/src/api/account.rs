//! Cloud account onboarding.

use serde::Deserialize;

use super::client::Client;
use super::error::ApiError;

pub const CLOUD_TYPE_AWS: i64 = 1;
pub const CLOUD_TYPE_GCP: i64 = 4;

/// Fields for `setup_account_profile` / `edit_account_profile`. Which fields
/// matter depends on `cloud_type`; the rest stay empty and are left off the
/// form.
#[derive(Debug, Clone, Default)]
pub struct AccountRequest {
    pub account_name: String,
    pub cloud_type: i64,
    pub aws_account_number: String,
    pub aws_iam: bool,
    pub aws_access_key: String,
    pub aws_secret_key: String,
    pub gcloud_project_name: String,
    pub gcloud_project_credentials: String,
}

impl AccountRequest {
    fn form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("account_name", self.account_name.clone()),
            ("cloud_type", self.cloud_type.to_string()),
        ];
        match self.cloud_type {
            CLOUD_TYPE_AWS => {
                form.push(("aws_account_number", self.aws_account_number.clone()));
                form.push(("aws_iam", self.aws_iam.to_string()));
                if !self.aws_iam {
                    form.push(("aws_access_key", self.aws_access_key.clone()));
                    form.push(("aws_secret_key", self.aws_secret_key.clone()));
                }
            }
            CLOUD_TYPE_GCP => {
                form.push(("gcloud_project_name", self.gcloud_project_name.clone()));
                form.push(("filename", "gcloud_project_credentials.json".to_string()));
                form.push(("contents", self.gcloud_project_credentials.clone()));
            }
            _ => {}
        }
        form
    }
}

/// Entry of the `list_accounts` response. Read-only field names differ from
/// the form names used on writes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountSummary {
    #[serde(default)]
    pub account_name: String,
    #[serde(default)]
    pub cloud_type: i64,
    #[serde(default, rename = "account_number")]
    pub aws_account_number: String,
    #[serde(default, rename = "aws_iam")]
    pub aws_iam: String,
    #[serde(default, rename = "project")]
    pub gcloud_project_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct AccountList {
    #[serde(default)]
    account_list: Vec<AccountSummary>,
}

impl Client {
    pub async fn create_account(&self, account: &AccountRequest) -> Result<(), ApiError> {
        self.post_api("setup_account_profile", &account.form()).await
    }

    pub async fn get_account(&self, account_name: &str) -> Result<AccountSummary, ApiError> {
        let list: AccountList = self.post_api_with_results("list_accounts", &[]).await?;
        list.account_list
            .into_iter()
            .find(|account| account.account_name == account_name)
            .ok_or(ApiError::NotFound)
    }

    pub async fn update_account(&self, account: &AccountRequest) -> Result<(), ApiError> {
        self.post_api("edit_account_profile", &account.form()).await
    }

    pub async fn delete_account(&self, account_name: &str) -> Result<(), ApiError> {
        self.post_api(
            "delete_account_profile",
            &[("account_name", account_name.to_string())],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aws_keys_are_omitted_when_iam_roles_are_used() {
        let account = AccountRequest {
            account_name: "acc".to_string(),
            cloud_type: CLOUD_TYPE_AWS,
            aws_account_number: "123456789012".to_string(),
            aws_iam: true,
            ..Default::default()
        };
        let form = account.form();
        assert!(form.iter().any(|(k, v)| *k == "aws_iam" && v == "true"));
        assert!(!form.iter().any(|(k, _)| *k == "aws_access_key"));
    }

    #[test]
    fn gcp_credentials_upload_as_file_contents() {
        let account = AccountRequest {
            account_name: "acc".to_string(),
            cloud_type: CLOUD_TYPE_GCP,
            gcloud_project_name: "my-project".to_string(),
            gcloud_project_credentials: "{\"type\":\"service_account\"}".to_string(),
            ..Default::default()
        };
        let form = account.form();
        assert!(form.iter().any(|(k, _)| *k == "contents"));
        assert!(!form.iter().any(|(k, _)| *k == "aws_account_number"));
    }

    #[test]
    fn account_list_decodes() {
        let list: AccountList = serde_json::from_str(
            r#"{"account_list": [
                {"account_name": "acc", "cloud_type": 1, "account_number": "123456789012"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(list.account_list[0].aws_account_number, "123456789012");
    }
}
