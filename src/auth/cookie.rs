// Refresh-token cookie contract

use crate::auth::{error::AuthError, token::REFRESH_TOKEN_TTL_SECS};
use axum::http::{header, HeaderMap, HeaderValue};

/// Cookie holding the refresh token
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Cookie some clients keep the access token in; only ever cleared
pub const ACCESS_COOKIE_NAME: &str = "accessToken";

/// How session cookies are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
}

impl CookiePolicy {
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    fn secure_suffix(&self) -> &'static str {
        if self.secure {
            "; Secure"
        } else {
            ""
        }
    }

    /// `Set-Cookie` value carrying a refresh token for seven days
    pub fn refresh_cookie(&self, token: &str) -> Result<HeaderValue, AuthError> {
        let cookie = format!(
            "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{}",
            REFRESH_COOKIE_NAME,
            token,
            REFRESH_TOKEN_TTL_SECS,
            self.secure_suffix()
        );
        HeaderValue::from_str(&cookie)
            .map_err(|e| AuthError::Internal(format!("invalid refresh cookie: {}", e)))
    }

    /// `Set-Cookie` value that expires the named cookie immediately
    pub fn cleared_cookie(&self, name: &str) -> Result<HeaderValue, AuthError> {
        let cookie = format!(
            "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0{}",
            name,
            self.secure_suffix()
        );
        HeaderValue::from_str(&cookie)
            .map_err(|e| AuthError::Internal(format!("invalid clearing cookie: {}", e)))
    }

    /// Append a clearing `Set-Cookie` for the refresh token
    pub fn clear_refresh(&self, headers: &mut HeaderMap) -> Result<(), AuthError> {
        headers.append(header::SET_COOKIE, self.cleared_cookie(REFRESH_COOKIE_NAME)?);
        Ok(())
    }
}

/// Extract a cookie value from the Cookie header.
///
/// An empty value (what logout leaves behind) counts as absent.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}
