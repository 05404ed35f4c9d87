use serde::Deserialize;

use crate::api::ApiError;

fn default_success() -> bool {
    true
}

/// Envelope the backend wraps around every response body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "statusCode", default)]
    pub status_code: Option<u16>,
}

impl<T> ApiResponse<T> {
    fn rejection(&self) -> ApiError {
        ApiError::Rejected(
            self.message
                .clone()
                .unwrap_or_else(|| "request was not successful".to_string()),
        )
    }

    /// Unwrap the payload, failing on `success: false` or a missing `data`.
    pub fn into_result(self) -> Result<T, ApiError> {
        if !self.success {
            return Err(self.rejection());
        }
        self.data
            .ok_or_else(|| ApiError::InvalidResponse("response has no data".to_string()))
    }

    /// Only check the success flag; used where the payload is irrelevant.
    pub fn into_ack(self) -> Result<(), ApiError> {
        if self.success {
            Ok(())
        } else {
            Err(self.rejection())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_success() {
        let json = r#"{"statusCode":200,"data":{"n":1},"message":"ok","success":true}"#;
        let resp: ApiResponse<serde_json::Value> = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status_code, Some(200));
        assert_eq!(resp.into_result().unwrap()["n"], 1);
    }

    #[test]
    fn test_envelope_failure_carries_message() {
        let json = r#"{"success":false,"data":null,"message":"Group not found"}"#;
        let resp: ApiResponse<serde_json::Value> = serde_json::from_str(json).unwrap();
        assert!(matches!(resp.into_result(), Err(ApiError::Rejected(m)) if m == "Group not found"));
    }

    #[test]
    fn test_envelope_missing_data() {
        let resp: ApiResponse<Vec<u8>> = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(matches!(resp.clone().into_result(), Err(ApiError::InvalidResponse(_))));
        assert!(resp.into_ack().is_ok());
    }

    #[derive(Debug, Deserialize)]
    struct Token {
        #[serde(rename = "accessToken")]
        access_token: String,
    }

    #[test]
    fn test_envelope_payload_without_default() {
        let resp: ApiResponse<Token> =
            serde_json::from_str(r#"{"success":true,"data":{"accessToken":"a1"}}"#).unwrap();
        assert_eq!(resp.into_result().unwrap().access_token, "a1");

        let resp: ApiResponse<Token> = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(resp.data.is_none());
    }
}
