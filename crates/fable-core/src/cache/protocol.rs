//! Wire types for the remote cache protocol
//!
//! Shared between the reqwest client in this crate and the cache server
//! binary so both sides agree on the envelope shape.

use serde::{Deserialize, Serialize};

/// Response envelope for `GET /api/cache` and `POST /api/cache`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn hit(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn ok() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Body for `POST /api/cache`.
///
/// Fields are optional so the server can answer a targeted 400 instead of
/// a generic deserialization rejection when one is missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_envelope_shape() {
        let json = serde_json::to_value(ApiResponse::hit(serde_json::json!({"a": 1}))).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": {"a": 1}}));
    }

    #[test]
    fn test_failure_envelope_shape() {
        let json = serde_json::to_value(ApiResponse::failure("Not found")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "error": "Not found"})
        );
    }
}
