//! Response envelopes shared by every controller action

use serde::Deserialize;

/// The controller wraps every response in `{ "return": bool, "reason": ... }`
/// with an action-specific `results` payload.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(rename = "return")]
    pub success: bool,
    #[serde(default)]
    pub reason: String,
    pub results: Option<T>,
}

/// Envelope for actions whose results are not consumed.
pub type BasicResponse = ApiResponse<serde_json::Value>;

#[derive(Debug, Deserialize)]
pub struct LoginResults {
    #[serde(rename = "CID")]
    pub cid: String,
}

/// First response of an async action: `results` is the numeric task id.
#[derive(Debug, Deserialize)]
pub struct AsyncSubmitResponse {
    #[serde(rename = "return")]
    pub success: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub results: u64,
}

/// Polled from the backend endpoint with `check_task_status`.
#[derive(Debug, Deserialize)]
pub struct TaskStatusResponse {
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub result: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_basic_envelope() {
        let body = r#"{"return": false, "reason": "CID is invalid"}"#;
        let resp: BasicResponse = serde_json::from_str(body).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.reason, "CID is invalid");
        assert!(resp.results.is_none());
    }

    #[test]
    fn decodes_login_results() {
        let body = r#"{"return": true, "results": {"CID": "abc123"}}"#;
        let resp: ApiResponse<LoginResults> = serde_json::from_str(body).unwrap();
        assert!(resp.success);
        assert_eq!(resp.results.unwrap().cid, "abc123");
    }

    #[test]
    fn decodes_async_submit() {
        let body = r#"{"return": true, "results": 42}"#;
        let resp: AsyncSubmitResponse = serde_json::from_str(body).unwrap();
        assert!(resp.success);
        assert_eq!(resp.results, 42);
    }
}
