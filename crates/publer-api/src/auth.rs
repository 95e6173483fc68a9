//! Caller credentials and the upstream headers built from them.

use axum::http::HeaderMap;
use publer_types::Headers;

/// Credentials supplied by the tool caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: Option<String>,
}

impl Credentials {
    /// `Authorization: Bearer <key>` wins over `x-api-key`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let api_key = header("authorization")
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or_else(|| header("x-api-key"))
            .map(String::from);
        Self { api_key }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

/// Headers forwarded upstream. The upstream expects the `Bearer-API` scheme.
pub fn upstream_headers(api_key: &str, workspace_id: Option<&str>) -> Headers {
    let mut headers = Headers::new();
    headers.insert("Authorization".to_string(), format!("Bearer-API {}", api_key));
    if let Some(id) = workspace_id.map(str::trim).filter(|id| !id.is_empty()) {
        headers.insert("Publer-Workspace-Id".to_string(), id.to_string());
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_takes_priority() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        headers.insert("x-api-key", HeaderValue::from_static("xyz"));
        assert_eq!(Credentials::from_headers(&headers).api_key(), Some("abc"));
    }

    #[test]
    fn falls_back_to_api_key_header() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic Zm9v"));
        headers.insert("x-api-key", HeaderValue::from_static("xyz"));
        assert_eq!(Credentials::from_headers(&headers).api_key(), Some("xyz"));
        assert_eq!(Credentials::from_headers(&HeaderMap::new()).api_key(), None);
    }

    #[test]
    fn upstream_scheme_and_workspace() {
        let headers = upstream_headers("k1", Some("ws-9"));
        assert_eq!(headers["Authorization"], "Bearer-API k1");
        assert_eq!(headers["Publer-Workspace-Id"], "ws-9");
        assert!(!upstream_headers("k1", Some("  ")).contains_key("Publer-Workspace-Id"));
    }
}
