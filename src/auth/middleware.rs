// Auth gate for protected routes

use crate::auth::{
    cookie::{get_cookie, REFRESH_COOKIE_NAME},
    error::AuthError,
    models::Role,
    service::{AuthService, RenewalPath, RenewedSession},
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, warn};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Identity established by the auth gate, available to handlers as an
/// extractor. Rejects with 401 when the gate did not run or the session
/// carried no user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub user_id: i32,
    pub email: String,
    pub role: Role,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedIdentity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedIdentity>()
            .cloned()
            .ok_or_else(|| {
                warn!(
                    "No authenticated identity on request to {}",
                    parts.uri.path()
                );
                AuthError::MissingToken
            })
    }
}

/// Middleware run in front of every protected route.
///
/// Verifies the refresh cookie, mints a short-lived access token and attaches
/// identity as `x-user-*` headers, an `Authorization: Bearer` header and an
/// `AuthenticatedIdentity` extension. Rejections are 401 and clear the
/// cookie when it failed verification.
pub async fn auth_gate(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let endpoint = request.uri().path().to_string();
    let refresh_token = get_cookie(request.headers(), REFRESH_COOKIE_NAME);

    let renewed = match auth.validate_and_rotate(refresh_token, RenewalPath::Gate) {
        Ok(renewed) => renewed,
        Err(err) => {
            warn!("Auth gate rejected request to {}: {}", endpoint, err);
            return session_rejection(&auth, err);
        }
    };

    if let Err(err) = attach_identity(&mut request, &renewed) {
        return err.into_response();
    }

    debug!(
        "Auth gate passed: email={}, role={}, endpoint={}",
        renewed.identity.email, renewed.identity.role, endpoint
    );
    next.run(request).await
}

/// Turn a renewal failure into a response, expiring the refresh cookie when
/// it was present but unusable
pub fn session_rejection(auth: &AuthService, err: AuthError) -> Response {
    let clear = matches!(err, AuthError::VerificationFailed);
    let mut response = err.into_response();
    if clear {
        if let Err(e) = auth.cookies().clear_refresh(response.headers_mut()) {
            warn!("Could not clear refresh cookie: {}", e);
        }
    }
    response
}

fn attach_identity(request: &mut Request, renewed: &RenewedSession) -> Result<(), AuthError> {
    let identity = &renewed.identity;
    let headers = request.headers_mut();

    // Never trust identity headers supplied by the client
    headers.remove(USER_ID_HEADER);
    headers.remove(USER_EMAIL_HEADER);
    headers.remove(USER_ROLE_HEADER);

    if let Some(user_id) = identity.user_id {
        headers.insert(USER_ID_HEADER, HeaderValue::from(user_id));
    }
    headers.insert(USER_EMAIL_HEADER, header_value(&identity.email)?);
    headers.insert(USER_ROLE_HEADER, HeaderValue::from_static(identity.role.as_str()));
    headers.insert(
        header::AUTHORIZATION,
        header_value(&format!("Bearer {}", renewed.access_token))?,
    );

    if let Some(user_id) = identity.user_id {
        request.extensions_mut().insert(AuthenticatedIdentity {
            user_id,
            email: identity.email.clone(),
            role: identity.role,
        });
    }
    Ok(())
}

fn header_value(value: &str) -> Result<HeaderValue, AuthError> {
    HeaderValue::from_str(value)
        .map_err(|e| AuthError::Internal(format!("identity not representable as header: {}", e)))
}
