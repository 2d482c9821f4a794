//! Aviatrix controller REST client
//!
//! Every controller operation is a form-encoded POST or a GET against
//! `https://{controller_ip}/v1/api`, selected by an `action` parameter and
//! authenticated with the CID session token obtained from `login`. The
//! controller ships a self-signed certificate, so certificate verification is
//! disabled.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::error::ApiError;
use super::response::{ApiResponse, AsyncSubmitResponse, BasicResponse, LoginResults, TaskStatusResponse};

#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    backend_url: String,
    username: String,
    password: String,
    cid: RwLock<String>,
    poll_interval: Duration,
    max_polls: u32,
}

fn session_expired(reason: &str) -> bool {
    reason.contains("CID is invalid") || reason.contains("Invalid session")
}

impl Client {
    pub fn new(controller_ip: &str, username: &str, password: &str) -> Result<Self, ApiError> {
        let base_url = format!("https://{controller_ip}/v1/api");
        let backend_url = format!("https://{controller_ip}/v1/backend1");
        Self::build(
            base_url,
            backend_url,
            username,
            password,
            Duration::from_secs(10),
            360,
        )
    }

    /// Test constructor pointing at an HTTP mock instead of a controller,
    /// with fast async polling.
    pub fn with_base_url(
        base_url: &str,
        backend_url: &str,
        username: &str,
        password: &str,
    ) -> Result<Self, ApiError> {
        Self::build(
            base_url.to_string(),
            backend_url.to_string(),
            username,
            password,
            Duration::from_millis(10),
            5,
        )
    }

    fn build(
        base_url: String,
        backend_url: String,
        username: &str,
        password: &str,
        poll_interval: Duration,
        max_polls: u32,
    ) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                backend_url,
                username: username.to_string(),
                password: password.to_string(),
                cid: RwLock::new(String::new()),
                poll_interval,
                max_polls,
            }),
        })
    }

    /// Logs in and stores the CID session token used by every other action.
    pub async fn login(&self) -> Result<(), ApiError> {
        let form = vec![
            ("action".to_string(), "login".to_string()),
            ("username".to_string(), self.inner.username.clone()),
            ("password".to_string(), self.inner.password.clone()),
        ];

        let response = self
            .inner
            .http_client
            .post(&self.inner.base_url)
            .form(&form)
            .send()
            .await?;
        let body = response.text().await?;
        let data: ApiResponse<LoginResults> = serde_json::from_str(&body).map_err(|e| {
            ApiError::ParseError {
                action: "login".to_string(),
                message: format!("{e}; body: {body}"),
            }
        })?;

        if !data.success {
            return Err(ApiError::LoginFailed(data.reason));
        }
        let results = data.results.ok_or_else(|| ApiError::ParseError {
            action: "login".to_string(),
            message: "missing CID in login results".to_string(),
        })?;

        tracing::debug!("logged in to controller");
        *self.inner.cid.write().await = results.cid;
        Ok(())
    }

    async fn form_with_session(&self, action: &str, params: &[(&str, String)]) -> Vec<(String, String)> {
        let cid = self.inner.cid.read().await.clone();
        let mut form = Vec::with_capacity(params.len() + 2);
        form.push(("action".to_string(), action.to_string()));
        form.push(("CID".to_string(), cid));
        for (name, value) in params {
            form.push((name.to_string(), value.clone()));
        }
        form
    }

    /// Form-encoded POST of `action`, re-logging-in once when the session
    /// token has expired. Returns the decoded envelope; the caller decides
    /// what a `return: false` means.
    async fn post_envelope(
        &self,
        action: &str,
        params: &[(&str, String)],
    ) -> Result<BasicResponse, ApiError> {
        let mut relogged = false;
        loop {
            let form = self.form_with_session(action, params).await;
            tracing::debug!(action, "POST to controller");
            let response = self
                .inner
                .http_client
                .post(&self.inner.base_url)
                .form(&form)
                .send()
                .await?;
            let body = response.text().await?;
            let data: BasicResponse =
                serde_json::from_str(&body).map_err(|e| ApiError::ParseError {
                    action: action.to_string(),
                    message: format!("{e}; body: {body}"),
                })?;

            if !data.success && session_expired(&data.reason) && !relogged {
                tracing::debug!(action, "session expired, logging in again");
                relogged = true;
                self.login().await?;
                continue;
            }
            return Ok(data);
        }
    }

    /// GET of `action`, retried with a doubling backoff on transport errors.
    async fn get_envelope(
        &self,
        action: &str,
        params: &[(&str, String)],
    ) -> Result<BasicResponse, ApiError> {
        let mut relogged = false;
        let mut backoff = Duration::from_millis(500);
        let max_tries = 5;
        let mut tries = 0;

        loop {
            let query = self.form_with_session(action, params).await;
            tracing::debug!(action, "GET to controller");
            let result = async {
                let response = self
                    .inner
                    .http_client
                    .get(&self.inner.base_url)
                    .query(&query)
                    .send()
                    .await?;
                response.text().await
            }
            .await;

            let body = match result {
                Ok(body) => body,
                Err(error) => {
                    tries += 1;
                    if tries >= max_tries {
                        return Err(error.into());
                    }
                    tracing::debug!(action, %error, "GET failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    continue;
                }
            };

            let data: BasicResponse =
                serde_json::from_str(&body).map_err(|e| ApiError::ParseError {
                    action: action.to_string(),
                    message: format!("{e}; body: {body}"),
                })?;

            if !data.success && session_expired(&data.reason) && !relogged {
                relogged = true;
                self.login().await?;
                continue;
            }
            return Ok(data);
        }
    }

    /// POST expecting only success or failure.
    pub async fn post_api(&self, action: &str, params: &[(&str, String)]) -> Result<(), ApiError> {
        self.post_api_allowing(action, params, &[]).await
    }

    /// POST where a `return: false` with a reason containing one of `allow`
    /// still counts as success (e.g. setting a value that is already set).
    pub async fn post_api_allowing(
        &self,
        action: &str,
        params: &[(&str, String)],
        allow: &[&str],
    ) -> Result<(), ApiError> {
        let data = self.post_envelope(action, params).await?;
        if data.success || allow.iter().any(|text| data.reason.contains(text)) {
            Ok(())
        } else {
            Err(ApiError::from_rest(action, data.reason))
        }
    }

    /// POST returning the decoded `results` payload.
    pub async fn post_api_with_results<T: DeserializeOwned>(
        &self,
        action: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let data = self.post_envelope(action, params).await?;
        if !data.success {
            return Err(ApiError::from_rest(action, data.reason));
        }
        decode_results(action, data)
    }

    /// GET returning the decoded `results` payload.
    pub async fn get_api<T: DeserializeOwned>(
        &self,
        action: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let data = self.get_envelope(action, params).await?;
        if !data.success {
            return Err(ApiError::from_rest(action, data.reason));
        }
        decode_results(action, data)
    }

    /// Submits an async action and polls `check_task_status` on the backend
    /// endpoint until the task completes.
    pub async fn post_async_api(
        &self,
        action: &str,
        params: &[(&str, String)],
    ) -> Result<(), ApiError> {
        let form = self.form_with_session(action, params).await;
        let response = self
            .inner
            .http_client
            .post(&self.inner.base_url)
            .form(&form)
            .send()
            .await?;
        let body = response.text().await?;
        let data: AsyncSubmitResponse =
            serde_json::from_str(&body).map_err(|e| ApiError::ParseError {
                action: action.to_string(),
                message: format!("{e}; body: {body}"),
            })?;
        if !data.success || data.results == 0 {
            return Err(ApiError::from_rest(action, data.reason));
        }

        let task_id = data.results.to_string();
        for _ in 0..self.inner.max_polls {
            let poll_form = vec![
                ("action".to_string(), "check_task_status".to_string()),
                ("CID".to_string(), self.inner.cid.read().await.clone()),
                ("id".to_string(), task_id.clone()),
                ("pos".to_string(), "0".to_string()),
            ];
            let response = match self
                .inner
                .http_client
                .post(&self.inner.backend_url)
                .form(&poll_form)
                .send()
                .await
            {
                Ok(response) => response,
                Err(error) => {
                    // Transient backend error; keep polling.
                    tracing::debug!(action, %error, "task status poll failed");
                    tokio::time::sleep(self.inner.poll_interval).await;
                    continue;
                }
            };
            let body = response.text().await?;
            let status: TaskStatusResponse =
                serde_json::from_str(&body).map_err(|e| ApiError::ParseError {
                    action: action.to_string(),
                    message: format!("{e}; body: {body}"),
                })?;
            if !status.done {
                tokio::time::sleep(self.inner.poll_interval).await;
                continue;
            }
            if status.status {
                return Ok(());
            }
            return Err(ApiError::from_rest(action, status.result));
        }

        Err(ApiError::AsyncTimeout {
            action: action.to_string(),
            waited_secs: self.inner.poll_interval.as_secs() * u64::from(self.inner.max_polls),
        })
    }
}

fn decode_results<T: DeserializeOwned>(action: &str, data: BasicResponse) -> Result<T, ApiError> {
    let results = data.results.ok_or_else(|| ApiError::ParseError {
        action: action.to_string(),
        message: "missing results in response".to_string(),
    })?;
    serde_json::from_value(results).map_err(|e| ApiError::ParseError {
        action: action.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    async fn logged_in_client(server: &Server) -> Client {
        let client = Client::with_base_url(
            &format!("{}/v1/api", server.url()),
            &format!("{}/v1/backend1", server.url()),
            "admin",
            "password",
        )
        .unwrap();
        client
    }

    #[tokio::test]
    async fn login_stores_cid_for_later_calls() {
        let mut server = Server::new_async().await;
        let login_mock = server
            .mock("POST", "/v1/api")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("action".into(), "login".into()),
                Matcher::UrlEncoded("username".into(), "admin".into()),
            ]))
            .with_body(r#"{"return": true, "results": {"CID": "session-1"}}"#)
            .create_async()
            .await;
        let action_mock = server
            .mock("POST", "/v1/api")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("action".into(), "enable_bgp_ecmp".into()),
                Matcher::UrlEncoded("CID".into(), "session-1".into()),
            ]))
            .with_body(r#"{"return": true}"#)
            .create_async()
            .await;

        let client = logged_in_client(&server).await;
        client.login().await.unwrap();
        client.post_api("enable_bgp_ecmp", &[]).await.unwrap();

        login_mock.assert_async().await;
        action_mock.assert_async().await;
    }

    #[tokio::test]
    async fn login_failure_is_reported() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/api")
            .with_body(r#"{"return": false, "reason": "Authentication failed"}"#)
            .create_async()
            .await;

        let client = logged_in_client(&server).await;
        let err = client.login().await.unwrap_err();
        assert!(matches!(err, ApiError::LoginFailed(_)));
    }

    #[tokio::test]
    async fn expired_session_triggers_one_relogin() {
        let mut server = Server::new_async().await;
        // First attempt with the stale CID fails, login refreshes it, retry
        // succeeds.
        let stale_mock = server
            .mock("POST", "/v1/api")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("action".into(), "enable_bgp_ecmp".into()),
                Matcher::UrlEncoded("CID".into(), "".into()),
            ]))
            .with_body(r#"{"return": false, "reason": "CID is invalid"}"#)
            .create_async()
            .await;
        let login_mock = server
            .mock("POST", "/v1/api")
            .match_body(Matcher::UrlEncoded("action".into(), "login".into()))
            .with_body(r#"{"return": true, "results": {"CID": "fresh"}}"#)
            .create_async()
            .await;
        let retry_mock = server
            .mock("POST", "/v1/api")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("action".into(), "enable_bgp_ecmp".into()),
                Matcher::UrlEncoded("CID".into(), "fresh".into()),
            ]))
            .with_body(r#"{"return": true}"#)
            .create_async()
            .await;

        let client = logged_in_client(&server).await;
        client.post_api("enable_bgp_ecmp", &[]).await.unwrap();

        stale_mock.assert_async().await;
        login_mock.assert_async().await;
        retry_mock.assert_async().await;
    }

    #[tokio::test]
    async fn allowed_reason_is_not_an_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/api")
            .with_body(r#"{"return": false, "reason": "No change on transit gateway"}"#)
            .create_async()
            .await;

        let client = logged_in_client(&server).await;
        client
            .post_api_allowing(
                "edit_transit_local_as_number",
                &[],
                &["No change on transit gateway"],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_object_maps_to_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v1/api")
            .match_query(Matcher::UrlEncoded("action".into(), "get_gateway_info".into()))
            .with_body(r#"{"return": false, "reason": "Gateway gw-1 does not exist."}"#)
            .create_async()
            .await;

        let client = logged_in_client(&server).await;
        let err = client
            .get_api::<serde_json::Value>(
                "get_gateway_info",
                &[("gateway_name", "gw-1".to_string())],
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn async_api_polls_until_done() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/api")
            .match_body(Matcher::UrlEncoded(
                "action".into(),
                "delete_multicloud_gateway".into(),
            ))
            .with_body(r#"{"return": true, "results": 7}"#)
            .create_async()
            .await;
        let poll_mock = server
            .mock("POST", "/v1/backend1")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("action".into(), "check_task_status".into()),
                Matcher::UrlEncoded("id".into(), "7".into()),
                Matcher::UrlEncoded("pos".into(), "0".into()),
            ]))
            .with_body(r#"{"done": true, "status": true, "result": "done"}"#)
            .create_async()
            .await;

        let client = logged_in_client(&server).await;
        client
            .post_async_api("delete_multicloud_gateway", &[])
            .await
            .unwrap();
        poll_mock.assert_async().await;
    }

    #[tokio::test]
    async fn async_api_reports_failed_task() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/api")
            .with_body(r#"{"return": true, "results": 9}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/v1/backend1")
            .with_body(r#"{"done": true, "status": false, "result": "gateway busy"}"#)
            .create_async()
            .await;

        let client = logged_in_client(&server).await;
        let err = client
            .post_async_api("delete_multicloud_gateway", &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("gateway busy"));
    }
}
