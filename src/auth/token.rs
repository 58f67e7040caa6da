// JWT token signing and verification

use crate::auth::{error::AuthError, models::Role};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Access token lifetime for tokens minted at login (75 minutes)
pub const LOGIN_ACCESS_TOKEN_TTL_SECS: i64 = 75 * 60;

/// Access token lifetime for the explicit refresh endpoint (30 minutes)
pub const REFRESH_ENDPOINT_ACCESS_TOKEN_TTL_SECS: i64 = 30 * 60;

/// Access token lifetime for tokens minted by the auth gate (15 minutes)
pub const GATE_ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;

/// Refresh token lifetime (7 days), also the cookie Max-Age
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Distinguishes access tokens from refresh tokens so one cannot stand in
/// for the other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Identity fields embedded in every token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Option<i32>,
    pub email: String,
    pub role: Role,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Older refresh tokens may lack the user id; email and role suffice
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i32>,
    pub email: String,
    pub role: Role,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Lifetimes per issuing path, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub login_access: i64,
    pub refresh_access: i64,
    pub gate_access: i64,
    pub refresh: i64,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            login_access: LOGIN_ACCESS_TOKEN_TTL_SECS,
            refresh_access: REFRESH_ENDPOINT_ACCESS_TOKEN_TTL_SECS,
            gate_access: GATE_ACCESS_TOKEN_TTL_SECS,
            refresh: REFRESH_TOKEN_TTL_SECS,
        }
    }
}

/// Token service for JWT operations, keyed by a single process-wide secret
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Sign `identity` into a token of the given type valid for `ttl_secs`
    pub fn sign(
        &self,
        identity: &Identity,
        token_type: TokenType,
        ttl_secs: i64,
    ) -> Result<String, AuthError> {
        self.sign_at(identity, token_type, ttl_secs, Utc::now().timestamp())
    }

    /// Sign with an explicit issued-at timestamp
    pub fn sign_at(
        &self,
        identity: &Identity,
        token_type: TokenType,
        ttl_secs: i64,
        now: i64,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            user_id: identity.user_id,
            email: identity.email.clone(),
            role: identity.role,
            token_type,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + ttl_secs,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenGenerationError(e.to_string()))
    }

    /// Verify a token of the expected type against the current time
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        self.verify_at(token, expected, Utc::now().timestamp())
    }

    /// Verify against an explicit timestamp.
    ///
    /// A token is expired once `now >= exp`; at exactly `iat + ttl` it is
    /// rejected. Every failure collapses into `VerificationFailed`.
    pub fn verify_at(&self, token: &str, expected: TokenType, now: i64) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below with an inclusive bound and no leeway
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Token rejected: {:?}", e.kind());
                AuthError::VerificationFailed
            })?;

        if now >= claims.exp {
            debug!("Token rejected: expired");
            return Err(AuthError::VerificationFailed);
        }

        if claims.token_type != expected {
            debug!("Token rejected: expected {:?}, got {:?}", expected, claims.token_type);
            return Err(AuthError::VerificationFailed);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_token_service() -> TokenService {
        TokenService::new(b"test_secret_key_for_testing_purposes")
    }

    fn guest(email: &str) -> Identity {
        Identity {
            user_id: Some(7),
            email: email.to_string(),
            role: Role::Guest,
        }
    }

    #[test]
    fn test_signed_token_verifies_before_expiry() {
        let service = test_token_service();
        let now = 1_700_000_000;
        let token = service
            .sign_at(&guest("a@x.com"), TokenType::Access, 900, now)
            .unwrap();

        let claims = service.verify_at(&token, TokenType::Access, now + 899).unwrap();
        assert_eq!(claims.identity(), guest("a@x.com"));
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_token_is_expired_at_exact_ttl() {
        let service = test_token_service();
        let now = 1_700_000_000;
        let token = service
            .sign_at(&guest("a@x.com"), TokenType::Access, 900, now)
            .unwrap();

        assert!(matches!(
            service.verify_at(&token, TokenType::Access, now + 900),
            Err(AuthError::VerificationFailed)
        ));
        assert!(service.verify_at(&token, TokenType::Access, now + 901).is_err());
    }

    #[test]
    fn test_expired_token_rejected_against_wall_clock() {
        let service = test_token_service();
        let past = Utc::now().timestamp() - 1000;
        let token = service
            .sign_at(&guest("a@x.com"), TokenType::Refresh, 500, past)
            .unwrap();

        assert!(matches!(
            service.verify(&token, TokenType::Refresh),
            Err(AuthError::VerificationFailed)
        ));
    }

    #[test]
    fn test_token_signature_verification() {
        let service1 = TokenService::new(b"secret1");
        let service2 = TokenService::new(b"secret2");

        let token = service1
            .sign(&guest("a@x.com"), TokenType::Refresh, REFRESH_TOKEN_TTL_SECS)
            .unwrap();

        assert!(service1.verify(&token, TokenType::Refresh).is_ok());
        assert!(matches!(
            service2.verify(&token, TokenType::Refresh),
            Err(AuthError::VerificationFailed)
        ));
    }

    #[test]
    fn test_malformed_tokens_are_rejected() {
        let service = test_token_service();

        for token in [
            "",
            "not.a.token",
            "invalid_token_format",
            "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.invalid.signature",
        ] {
            assert!(matches!(
                service.verify(token, TokenType::Access),
                Err(AuthError::VerificationFailed)
            ));
        }
    }

    #[test]
    fn test_access_token_is_not_a_refresh_token() {
        let service = test_token_service();
        let access = service
            .sign(&guest("a@x.com"), TokenType::Access, GATE_ACCESS_TOKEN_TTL_SECS)
            .unwrap();

        assert!(matches!(
            service.verify(&access, TokenType::Refresh),
            Err(AuthError::VerificationFailed)
        ));
    }

    #[test]
    fn test_missing_user_id_is_tolerated() {
        let service = test_token_service();
        let identity = Identity {
            user_id: None,
            email: "legacy@x.com".to_string(),
            role: Role::Admin,
        };
        let token = service
            .sign(&identity, TokenType::Refresh, REFRESH_TOKEN_TTL_SECS)
            .unwrap();

        let claims = service.verify(&token, TokenType::Refresh).unwrap();
        assert_eq!(claims.user_id, None);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn test_tokens_minted_together_differ() {
        let service = test_token_service();
        let now = 1_700_000_000;
        let a = service.sign_at(&guest("a@x.com"), TokenType::Access, 900, now).unwrap();
        let b = service.sign_at(&guest("a@x.com"), TokenType::Access, 900, now).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_default_lifetimes() {
        let lifetimes = TokenLifetimes::default();
        assert_eq!(lifetimes.login_access, 4500);
        assert_eq!(lifetimes.refresh_access, 1800);
        assert_eq!(lifetimes.gate_access, 900);
        assert_eq!(lifetimes.refresh, 604800);
    }

    proptest! {
        #[test]
        fn prop_token_claims_contain_identity(
            user_id in 1i32..1000000,
            email in "[a-z]{3,10}@[a-z]{3,10}\\.(com|org|net)",
            ttl in 1i64..REFRESH_TOKEN_TTL_SECS,
        ) {
            let service = test_token_service();
            let identity = Identity { user_id: Some(user_id), email, role: Role::Guest };
            let now = Utc::now().timestamp();

            let token = service.sign_at(&identity, TokenType::Refresh, ttl, now)?;
            let claims = service.verify_at(&token, TokenType::Refresh, now + ttl - 1)?;
            prop_assert_eq!(claims.identity(), identity);
            prop_assert!(service.verify_at(&token, TokenType::Refresh, now + ttl).is_err());
        }

        #[test]
        fn prop_malformed_tokens_rejected(malformed in "[a-zA-Z0-9._-]{0,80}") {
            let service = test_token_service();
            prop_assert!(service.verify(&malformed, TokenType::Refresh).is_err());
        }
    }
}
