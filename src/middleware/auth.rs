use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth::{self, Claims};
use crate::config;
use crate::error::ApiError;
use crate::types::Role;

/// Session claims of the caller, injected by `jwt_auth_middleware`
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub practice_id: Uuid,
    pub role: Role,
    pub email: String,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            practice_id: claims.practice_id,
            role: claims.role,
            email: claims.email,
        }
    }
}

/// Validates the session token (Bearer header or session cookie)
pub async fn jwt_auth_middleware(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let cookie_name = &config::config().security.session_cookie_name;
    let token = extract_token(request.headers(), cookie_name).map_err(ApiError::unauthorized)?;

    let claims = auth::verify_token(&token).map_err(|e| {
        tracing::debug!("Rejected session token: {}", e);
        ApiError::unauthorized("Invalid or expired session")
    })?;

    request.extensions_mut().insert(AuthUser::from(claims));
    Ok(next.run(request).await)
}

/// Bearer header wins over the cookie
pub fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Result<String, String> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let value = value.to_str().map_err(|_| "Invalid Authorization header format".to_string())?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| "Authorization header must use Bearer token format".to_string())?
            .trim();
        if token.is_empty() {
            return Err("Empty session token".to_string());
        }
        return Ok(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
        .ok_or_else(|| "Authentication required".to_string())
}

/// `Set-Cookie` value carrying the session token
pub fn session_cookie(name: &str, token: &str, max_age_secs: u64, secure: bool) -> String {
    let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}", name, token, max_age_secs);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_session_cookie(name: &str, secure: bool) -> String {
    session_cookie(name, "", 0, secure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_is_preferred() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        headers.insert(header::COOKIE, HeaderValue::from_static("gpc_session=cookie-token"));
        assert_eq!(extract_token(&headers, "gpc_session").unwrap(), "abc.def");
    }

    #[test]
    fn cookie_is_used_without_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; gpc_session=cookie-token"));
        assert_eq!(extract_token(&headers, "gpc_session").unwrap(), "cookie-token");
        assert!(extract_token(&HeaderMap::new(), "gpc_session").is_err());
    }

    #[test]
    fn malformed_authorization_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert!(extract_token(&headers, "gpc_session").is_err());
    }

    #[test]
    fn cookies_are_http_only() {
        let cookie = session_cookie("gpc_session", "tok", 3600, true);
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.ends_with("; Secure"));
        assert!(clear_session_cookie("gpc_session", false).contains("Max-Age=0"));
    }
}
