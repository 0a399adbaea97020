use crate::error::TransferError;
use serde::{Deserialize, Serialize};

/// JSON body returned by the upload endpoint for single-shot and chunk requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResponse {
    /// Interpret a response received with a 2xx `status`.
    pub fn into_result(self, status: u16) -> Result<Option<String>, TransferError> {
        if !self.success {
            return Err(TransferError::Server {
                status,
                message: self
                    .error
                    .unwrap_or_else(|| "upload rejected by server".to_string()),
            });
        }
        Ok(self.url.filter(|u| !u.is_empty()))
    }

    /// Extract a server message from an error body, falling back to the raw text.
    pub fn error_message(body: &str) -> String {
        serde_json::from_str::<UploadResponse>(body)
            .ok()
            .and_then(|r| r.error)
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    "Unknown error".to_string()
                } else {
                    trimmed.to_string()
                }
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_with_url() {
        let response: UploadResponse =
            serde_json::from_str(r#"{"success": true, "url": "https://cdn/x.mp4"}"#).unwrap();
        assert_eq!(
            response.into_result(200).unwrap().as_deref(),
            Some("https://cdn/x.mp4")
        );
    }

    #[test]
    fn test_intermediate_ack_has_no_url() {
        let response: UploadResponse = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert_eq!(response.into_result(200).unwrap(), None);
    }

    #[test]
    fn test_success_false_is_server_error() {
        let response: UploadResponse =
            serde_json::from_str(r#"{"success": false, "error": "bad chunk"}"#).unwrap();
        match response.into_result(200) {
            Err(TransferError::Server { status, message }) => {
                assert_eq!(status, 200);
                assert_eq!(message, "bad chunk");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(
            UploadResponse::error_message(r#"{"success": false, "error": "too big"}"#),
            "too big"
        );
        assert_eq!(UploadResponse::error_message("Bad Gateway"), "Bad Gateway");
        assert_eq!(UploadResponse::error_message(""), "Unknown error");
    }
}
