//! Per-request identity, assembled once at request entry and immutable after.
//!
//! Fields come from request headers plus claims mined from the forwarded
//! bearer token. The token itself is never validated here: authentication
//! is the upstream's concern and the gateway forwards the header verbatim.

use http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const HEADER_CLIENT_VERSION: &str = "client-version";
pub const HEADER_REQUEST_ID: &str = "x-request-id";
pub const HEADER_CLIENT_ID: &str = "x-client-id";
pub const HEADER_CLIENT_IDE: &str = "x-client-ide";
pub const HEADER_PROJECT_PATH: &str = "x-project-path";
pub const HEADER_LOGIN_FROM: &str = "x-login-from";
pub const HEADER_TASK_ID: &str = "x-task-id";
pub const HEADER_CALLER: &str = "x-caller";
pub const HEADER_SENDER: &str = "x-sender";

/// Optional organisational context from token claims.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub dept_level1: String,
    #[serde(default)]
    pub dept_level2: String,
    #[serde(default)]
    pub dept_level3: String,
    #[serde(default)]
    pub dept_level4: String,
    #[serde(default)]
    pub employee_number: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Identity {
    pub client_id: String,
    pub client_ide: String,
    pub client_version: String,
    pub project_path: String,
    pub user_name: String,
    pub login_from: String,
    /// Forwarded verbatim on every outbound call.
    pub auth_token: String,
    pub request_id: String,
    pub task_id: String,
    pub caller: String,
    pub sender: String,
    pub user_info: Option<UserInfo>,
}

/// Claims we mine from the forwarded token. All optional; a token that
/// decodes to none of them still yields a usable identity.
#[derive(Debug, Default, Deserialize)]
struct TokenClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    login_from: Option<String>,
    #[serde(default)]
    employee_number: Option<String>,
    /// Slash-separated department path, up to four levels.
    #[serde(default)]
    department: Option<String>,
}

impl Identity {
    /// Build the request identity from headers and token claims.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let auth_token = header_str(headers, "authorization");
        let claims = decode_claims(&auth_token).unwrap_or_default();

        let user_name = claims
            .username
            .or(claims.sub)
            .unwrap_or_else(|| "unknown".to_string());

        let user_info = build_user_info(claims.department.as_deref(), claims.employee_number);

        Self {
            client_id: header_str(headers, HEADER_CLIENT_ID),
            client_ide: header_str(headers, HEADER_CLIENT_IDE),
            client_version: header_str(headers, HEADER_CLIENT_VERSION),
            project_path: header_str(headers, HEADER_PROJECT_PATH),
            user_name,
            login_from: claims
                .login_from
                .unwrap_or_else(|| header_str(headers, HEADER_LOGIN_FROM)),
            auth_token,
            request_id: header_str(headers, HEADER_REQUEST_ID),
            task_id: header_str(headers, HEADER_TASK_ID),
            caller: header_str(headers, HEADER_CALLER),
            sender: header_str(headers, HEADER_SENDER),
            user_info,
        }
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn build_user_info(department: Option<&str>, employee_number: Option<String>) -> Option<UserInfo> {
    if department.is_none() && employee_number.is_none() {
        return None;
    }
    let mut info = UserInfo {
        employee_number: employee_number.unwrap_or_default(),
        ..Default::default()
    };
    if let Some(path) = department {
        let mut levels = path.split('/').filter(|s| !s.is_empty());
        info.dept_level1 = levels.next().unwrap_or_default().to_string();
        info.dept_level2 = levels.next().unwrap_or_default().to_string();
        info.dept_level3 = levels.next().unwrap_or_default().to_string();
        info.dept_level4 = levels.next().unwrap_or_default().to_string();
    }
    Some(info)
}

/// Decode claims from the payload without verifying the signature; the
/// gateway only forwards the token, it does not authenticate.
fn decode_claims(auth_header: &str) -> Option<TokenClaims> {
    let token = auth_header
        .strip_prefix("Bearer ")
        .unwrap_or(auth_header)
        .trim();
    if token.is_empty() {
        return None;
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    match decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            debug!(error = %e, "auth token is not a decodable JWT, forwarding as-is");
            None
        }
    }
}
