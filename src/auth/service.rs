// Authentication service: session issuance and renewal

use crate::auth::{
    cookie::CookiePolicy,
    error::AuthError,
    models::{RegisterRequest, Role, SessionCheckResponse, SessionUser, UserSummary},
    password::PasswordService,
    repository::UserStore,
    token::{Identity, TokenLifetimes, TokenService, TokenType},
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

/// Which caller is renewing a session; selects the access-token lifetime and
/// whether the refresh token is rotated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalPath {
    /// The auth gate in front of protected routes: keeps the refresh token
    Gate,
    /// The explicit refresh endpoint: rotates the refresh token
    RefreshEndpoint,
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserSummary,
    pub redirect: String,
}

/// Result of a successful renewal
#[derive(Debug, Clone)]
pub struct RenewedSession {
    pub identity: Identity,
    pub access_token: String,
    /// Replacement refresh token, present only when the path rotates
    pub refresh_token: Option<String>,
}

/// Authentication service coordinating all auth operations
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: TokenService,
    lifetimes: TokenLifetimes,
    cookies: CookiePolicy,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: TokenService,
        lifetimes: TokenLifetimes,
        cookies: CookiePolicy,
    ) -> Self {
        Self {
            users,
            tokens,
            lifetimes,
            cookies,
        }
    }

    pub fn cookies(&self) -> CookiePolicy {
        self.cookies
    }

    /// Register a new guest account
    pub async fn register(&self, request: RegisterRequest) -> Result<UserSummary, AuthError> {
        request.validate()?;
        PasswordService::validate_password_strength(&request.password)?;

        let email = request.email.trim().to_lowercase();
        let hash = PasswordService::hash_password(&request.password)?;
        let user = self.users.create_user(&email, &hash, Role::Guest).await?;

        info!("Registered user_id={}", user.id);
        Ok(UserSummary {
            email: user.email.clone(),
            role: user.role()?,
        })
    }

    /// Verify credentials and mint an access/refresh token pair.
    ///
    /// Unknown email and wrong password both yield `InvalidCredentials`.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let email = email.trim();

        let Some(user) = self.users.find_by_email(email).await? else {
            debug!("Login rejected: no matching account");
            return Err(AuthError::InvalidCredentials);
        };

        if !PasswordService::verify_password(password, &user.password_hash)? {
            debug!("Login rejected: password mismatch for user_id={}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        let identity = Identity {
            user_id: Some(user.id),
            email: user.email.clone(),
            role: user.role()?,
        };
        let access_token = self
            .tokens
            .sign(&identity, TokenType::Access, self.lifetimes.login_access)?;
        let refresh_token = self
            .tokens
            .sign(&identity, TokenType::Refresh, self.lifetimes.refresh)?;

        info!("User logged in: user_id={}", user.id);
        Ok(LoginOutcome {
            access_token,
            refresh_token,
            redirect: landing_page(identity.role).to_string(),
            user: UserSummary {
                email: identity.email,
                role: identity.role,
            },
        })
    }

    /// Validate a refresh token and mint a fresh access token for `path`.
    ///
    /// Shared by the refresh endpoint and the auth gate so both reject the
    /// same inputs the same way. Concurrent calls with one refresh token each
    /// succeed independently; earlier rotated tokens stay valid until expiry.
    pub fn validate_and_rotate(
        &self,
        refresh_token: Option<&str>,
        path: RenewalPath,
    ) -> Result<RenewedSession, AuthError> {
        let token = refresh_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = self.tokens.verify(token, TokenType::Refresh)?;
        let identity = claims.identity();

        let (access_ttl, rotate) = match path {
            RenewalPath::Gate => (self.lifetimes.gate_access, false),
            RenewalPath::RefreshEndpoint => (self.lifetimes.refresh_access, true),
        };

        let access_token = self.tokens.sign(&identity, TokenType::Access, access_ttl)?;
        let refresh_token = if rotate {
            Some(self.tokens.sign(&identity, TokenType::Refresh, self.lifetimes.refresh)?)
        } else {
            None
        };

        debug!(
            "Session renewed via {:?} for {}",
            path,
            identity.user_id.map_or_else(|| "legacy token".to_string(), |id| format!("user_id={}", id))
        );
        Ok(RenewedSession {
            identity,
            access_token,
            refresh_token,
        })
    }

    /// Report whether the refresh token describes a live session. Never fails.
    pub fn check_session(&self, refresh_token: Option<&str>) -> SessionCheckResponse {
        let Some(token) = refresh_token.filter(|t| !t.is_empty()) else {
            return SessionCheckResponse {
                is_logged_in: false,
                user: None,
            };
        };

        match self.tokens.verify(token, TokenType::Refresh) {
            Ok(claims) => SessionCheckResponse {
                is_logged_in: true,
                user: Some(SessionUser {
                    user_id: claims.user_id,
                    email: claims.email,
                    role: claims.role,
                }),
            },
            Err(e) => {
                warn!("Session check found an unusable refresh token: {}", e);
                SessionCheckResponse {
                    is_logged_in: false,
                    user: None,
                }
            }
        }
    }
}

fn landing_page(role: Role) -> &'static str {
    match role {
        Role::Admin => "/admin",
        Role::Guest => "/",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repository::InMemoryUserStore;
    use crate::auth::token::REFRESH_TOKEN_TTL_SECS;
    use chrono::Utc;

    const SECRET: &[u8] = b"test_secret_key_for_testing_purposes";

    async fn service_with_user(email: &str, password: &str, role: Role) -> (AuthService, Arc<InMemoryUserStore>) {
        let store = Arc::new(InMemoryUserStore::new());
        let hash = PasswordService::hash_password(password).unwrap();
        store.create_user(email, &hash, role).await.unwrap();

        let service = AuthService::new(
            store.clone(),
            TokenService::new(SECRET),
            TokenLifetimes::default(),
            CookiePolicy::new(false),
        );
        (service, store)
    }

    #[tokio::test]
    async fn login_mints_access_and_refresh_tokens() {
        let (service, _) = service_with_user("a@x.com", "p1", Role::Guest).await;
        let outcome = service.login("a@x.com", "p1").await.unwrap();

        assert_eq!(outcome.user, UserSummary { email: "a@x.com".to_string(), role: Role::Guest });
        assert_eq!(outcome.redirect, "/");

        let tokens = TokenService::new(SECRET);
        let access = tokens.verify(&outcome.access_token, TokenType::Access).unwrap();
        assert_eq!(access.exp - access.iat, 75 * 60);
        assert_eq!(access.user_id, Some(1));

        let refresh = tokens.verify(&outcome.refresh_token, TokenType::Refresh).unwrap();
        assert_eq!(refresh.exp - refresh.iat, REFRESH_TOKEN_TTL_SECS);
    }

    #[tokio::test]
    async fn admin_lands_on_admin_page() {
        let (service, _) = service_with_user("boss@x.com", "p1", Role::Admin).await;
        let outcome = service.login("boss@x.com", "p1").await.unwrap();
        assert_eq!(outcome.redirect, "/admin");
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_are_indistinguishable() {
        let (service, _) = service_with_user("a@x.com", "p1", Role::Guest).await;

        let unknown = service.login("nobody@x.com", "p1").await.unwrap_err();
        let mismatch = service.login("a@x.com", "wrong").await.unwrap_err();

        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(mismatch, AuthError::InvalidCredentials));
        assert_eq!(unknown.error_message(), mismatch.error_message());
        assert_eq!(unknown.status_code(), mismatch.status_code());
    }

    #[tokio::test]
    async fn refresh_endpoint_rotates_refresh_token() {
        let (service, _) = service_with_user("a@x.com", "p1", Role::Guest).await;
        let login = service.login("a@x.com", "p1").await.unwrap();

        let renewed = service
            .validate_and_rotate(Some(&login.refresh_token), RenewalPath::RefreshEndpoint)
            .unwrap();

        assert_ne!(renewed.access_token, login.access_token);
        let rotated = renewed.refresh_token.expect("refresh path rotates");
        assert_ne!(rotated, login.refresh_token);

        let tokens = TokenService::new(SECRET);
        let access = tokens.verify(&renewed.access_token, TokenType::Access).unwrap();
        assert_eq!(access.exp - access.iat, 30 * 60);
        assert!(tokens.verify(&rotated, TokenType::Refresh).is_ok());
    }

    #[tokio::test]
    async fn gate_keeps_refresh_token_and_mints_short_access_token() {
        let (service, store) = service_with_user("a@x.com", "p1", Role::Guest).await;
        let login = service.login("a@x.com", "p1").await.unwrap();
        let lookups_after_login = store.lookups();

        let renewed = service
            .validate_and_rotate(Some(&login.refresh_token), RenewalPath::Gate)
            .unwrap();

        assert!(renewed.refresh_token.is_none());
        assert_eq!(renewed.identity.email, "a@x.com");
        assert_eq!(renewed.identity.user_id, Some(1));

        let access = TokenService::new(SECRET)
            .verify(&renewed.access_token, TokenType::Access)
            .unwrap();
        assert_eq!(access.exp - access.iat, 15 * 60);
        // Stateless: renewal never touches the user store
        assert_eq!(store.lookups(), lookups_after_login);
    }

    #[tokio::test]
    async fn missing_and_invalid_tokens_are_rejected() {
        let (service, _) = service_with_user("a@x.com", "p1", Role::Guest).await;

        for path in [RenewalPath::Gate, RenewalPath::RefreshEndpoint] {
            assert!(matches!(service.validate_and_rotate(None, path), Err(AuthError::MissingToken)));
            assert!(matches!(service.validate_and_rotate(Some(""), path), Err(AuthError::MissingToken)));
            assert!(matches!(
                service.validate_and_rotate(Some("garbage"), path),
                Err(AuthError::VerificationFailed)
            ));
        }
    }

    #[tokio::test]
    async fn access_token_cannot_renew_a_session() {
        let (service, _) = service_with_user("a@x.com", "p1", Role::Guest).await;
        let login = service.login("a@x.com", "p1").await.unwrap();

        assert!(matches!(
            service.validate_and_rotate(Some(&login.access_token), RenewalPath::RefreshEndpoint),
            Err(AuthError::VerificationFailed)
        ));
    }

    #[tokio::test]
    async fn expired_refresh_token_is_rejected() {
        let (service, _) = service_with_user("a@x.com", "p1", Role::Guest).await;
        let identity = Identity {
            user_id: Some(1),
            email: "a@x.com".to_string(),
            role: Role::Guest,
        };
        let stale = TokenService::new(SECRET)
            .sign_at(&identity, TokenType::Refresh, 60, Utc::now().timestamp() - 120)
            .unwrap();

        assert!(matches!(
            service.validate_and_rotate(Some(&stale), RenewalPath::Gate),
            Err(AuthError::VerificationFailed)
        ));
    }

    #[tokio::test]
    async fn earlier_refresh_tokens_stay_valid_after_rotation() {
        let (service, _) = service_with_user("a@x.com", "p1", Role::Guest).await;
        let login = service.login("a@x.com", "p1").await.unwrap();

        let first = service
            .validate_and_rotate(Some(&login.refresh_token), RenewalPath::RefreshEndpoint)
            .unwrap();
        let second = service
            .validate_and_rotate(Some(&login.refresh_token), RenewalPath::RefreshEndpoint)
            .unwrap();

        assert_ne!(first.refresh_token, second.refresh_token);
        assert!(service
            .validate_and_rotate(Some(&login.refresh_token), RenewalPath::Gate)
            .is_ok());
    }

    #[tokio::test]
    async fn check_session_never_fails() {
        let (service, _) = service_with_user("a@x.com", "p1", Role::Guest).await;
        let login = service.login("a@x.com", "p1").await.unwrap();

        let live = service.check_session(Some(&login.refresh_token));
        assert!(live.is_logged_in);
        assert_eq!(live.user.unwrap().email, "a@x.com");

        assert!(!service.check_session(None).is_logged_in);
        assert!(!service.check_session(Some("garbage")).is_logged_in);
        assert!(!service.check_session(Some(&login.access_token)).is_logged_in);
    }

    #[tokio::test]
    async fn register_then_login() {
        let store = Arc::new(InMemoryUserStore::new());
        let service = AuthService::new(
            store,
            TokenService::new(SECRET),
            TokenLifetimes::default(),
            CookiePolicy::new(false),
        );

        let summary = service
            .register(RegisterRequest {
                email: "New@X.com".to_string(),
                password: "letters123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(summary.email, "new@x.com");
        assert_eq!(summary.role, Role::Guest);

        assert!(service.login("new@x.com", "letters123").await.is_ok());
        assert!(matches!(
            service
                .register(RegisterRequest {
                    email: "new@x.com".to_string(),
                    password: "letters123".to_string(),
                })
                .await,
            Err(AuthError::EmailAlreadyExists)
        ));
    }

    #[tokio::test]
    async fn register_rejects_weak_or_malformed_input() {
        let (service, _) = service_with_user("a@x.com", "p1", Role::Guest).await;

        assert!(matches!(
            service
                .register(RegisterRequest {
                    email: "not-an-email".to_string(),
                    password: "letters123".to_string(),
                })
                .await,
            Err(AuthError::ValidationError(_))
        ));
        assert!(matches!(
            service
                .register(RegisterRequest {
                    email: "b@x.com".to_string(),
                    password: "onlyletters".to_string(),
                })
                .await,
            Err(AuthError::ValidationError(_))
        ));
    }
}
