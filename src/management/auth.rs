//! Management API Authentication

use super::types::ApiAuthConfig;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;
use tracing::{debug, warn};

/// Credentials presented by a request
#[derive(Debug, PartialEq, Eq)]
enum Credentials {
    ApiKey(String),
    Basic { username: String, password: String },
}

impl Credentials {
    /// Every credential the headers carry, API key first
    fn from_headers(headers: &HeaderMap) -> Vec<Credentials> {
        let mut found = Vec::new();

        if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
            found.push(Credentials::ApiKey(key.to_string()));
        }

        let basic = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Basic "))
            .and_then(|encoded| general_purpose::STANDARD.decode(encoded.trim()).ok())
            .and_then(|decoded| String::from_utf8(decoded).ok());

        if let Some(pair) = basic {
            if let Some((username, password)) = pair.split_once(':') {
                found.push(Credentials::Basic {
                    username: username.to_string(),
                    password: password.to_string(),
                });
            }
        }

        found
    }
}

/// Checks management API requests against the configured credentials
pub struct ApiAuth {
    config: ApiAuthConfig,
}

impl ApiAuth {
    pub fn new(config: ApiAuthConfig) -> Self {
        Self { config }
    }

    fn accepts(&self, credentials: &Credentials) -> bool {
        match credentials {
            Credentials::ApiKey(key) => self.config.api_key.as_deref() == Some(key.as_str()),
            Credentials::Basic { username, password } => self
                .config
                .basic_auth
                .as_ref()
                .map(|b| &b.username == username && &b.password == password)
                .unwrap_or(false),
        }
    }

    /// Authenticate request
    pub fn authenticate(&self, headers: &HeaderMap) -> bool {
        if !self.config.enabled {
            return true;
        }

        if Credentials::from_headers(headers).iter().any(|c| self.accepts(c)) {
            debug!("Management API request authenticated");
            return true;
        }

        warn!("Management API authentication failed");
        false
    }
}

/// Authentication middleware function
pub async fn auth_middleware(
    State(auth): State<Arc<ApiAuth>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth.authenticate(request.headers()) {
        Ok(next.run(request).await)
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::management::types::BasicAuthConfig;
    use axum::http::HeaderValue;

    fn basic_header(pair: &str) -> HeaderValue {
        let value = format!("Basic {}", general_purpose::STANDARD.encode(pair));
        HeaderValue::from_str(&value).unwrap()
    }

    #[test]
    fn test_api_key_auth() {
        let auth = ApiAuth::new(ApiAuthConfig {
            enabled: true,
            api_key: Some("ledger-key".to_string()),
            basic_auth: None,
        });
        let mut headers = HeaderMap::new();
        assert!(!auth.authenticate(&headers));

        headers.insert("x-api-key", HeaderValue::from_static("ledger-key"));
        assert!(auth.authenticate(&headers));

        headers.insert("x-api-key", HeaderValue::from_static("wrong"));
        assert!(!auth.authenticate(&headers));
    }

    #[test]
    fn test_basic_auth_with_colon_in_password() {
        let auth = ApiAuth::new(ApiAuthConfig {
            enabled: true,
            api_key: None,
            basic_auth: Some(BasicAuthConfig {
                username: "viewer".to_string(),
                password: "p:ss".to_string(),
            }),
        });
        let mut headers = HeaderMap::new();

        headers.insert("authorization", basic_header("viewer:p:ss"));
        assert!(auth.authenticate(&headers));

        headers.insert("authorization", basic_header("viewer:nope"));
        assert!(!auth.authenticate(&headers));
    }

    #[test]
    fn test_api_key_not_accepted_without_configured_key() {
        let auth = ApiAuth::new(ApiAuthConfig {
            enabled: true,
            api_key: None,
            basic_auth: None,
        });
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static(""));
        assert!(!auth.authenticate(&headers));
    }

    #[test]
    fn test_disabled_auth() {
        let auth = ApiAuth::new(ApiAuthConfig::default());
        assert!(auth.authenticate(&HeaderMap::new()));
    }
}
