//! Billing API endpoint paths and request/response bodies.

use serde::{Deserialize, Serialize};

use billdesk_core::User;

// ============================================================================
// Endpoint Paths
// ============================================================================

/// Exchange credentials for a user record and tokens.
pub const LOGIN: &str = "/auth/login";

/// Best-effort server-side session teardown.
pub const LOGOUT: &str = "/auth/logout";

/// Mint a new access token from a refresh token.
pub const REFRESH: &str = "/auth/refresh";

/// Protected endpoint used to probe session liveness.
pub const DASHBOARD_SUMMARY: &str = "/dashboard/summary";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for login.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Response from login.
///
/// Every field is optional so an incomplete success body can be reported as
/// a validation failure instead of a decode error.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default, alias = "token")]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Request body for refresh.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Response from refresh. A missing refresh token keeps the current one.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    #[serde(alias = "token")]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn login_response_accepts_token_alias() {
        let response: LoginResponse = serde_json::from_value(json!({
            "user": {"id": 1, "email": "ada@example.com", "name": "Ada"},
            "token": "access",
            "refreshToken": "refresh"
        }))
        .unwrap();
        assert_eq!(response.user.unwrap().id, "1");
        assert_eq!(response.access_token.as_deref(), Some("access"));
        assert_eq!(response.refresh_token.as_deref(), Some("refresh"));
    }

    #[test]
    fn login_response_without_user() {
        let response: LoginResponse = serde_json::from_value(json!({"success": true})).unwrap();
        assert!(response.user.is_none());
    }

    #[test]
    fn refresh_request_is_camel_case() {
        let body = serde_json::to_value(RefreshRequest {
            refresh_token: "r1",
        })
        .unwrap();
        assert_eq!(body, json!({"refreshToken": "r1"}));
    }
}
