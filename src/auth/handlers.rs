// HTTP handlers for account and session endpoints

use crate::auth::{
    cookie::{get_cookie, ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME},
    error::AuthError,
    middleware::{session_rejection, AuthenticatedIdentity},
    models::{
        LoginRequest, LoginResponse, LogoutResponse, MeResponse, RefreshResponse, RegisterRequest,
        RegisterResponse, SessionCheckResponse,
    },
    service::{AuthService, RenewalPath},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Log in with email and password
/// POST /accounts/login
#[utoipa::path(
    post,
    path = "/accounts/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; refresh token set as httpOnly cookie", body = LoginResponse),
        (status = 401, description = "Invalid credentials or unreadable body", body = String, example = json!({"error": "Invalid credentials"}))
    ),
    tag = "accounts"
)]
pub async fn login_handler(
    State(auth): State<Arc<AuthService>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    let Json(request) = payload.map_err(|rejection| {
        debug!("Login body rejected: {}", rejection.body_text());
        AuthError::InvalidCredentials
    })?;

    // Any failure here surfaces as the same 401 so the response never hints
    // at whether the account exists
    let to_unauthorized = |err: AuthError| {
        if !err.is_unauthorized() {
            error!("Login failed internally: {}", err);
        }
        AuthError::InvalidCredentials
    };

    let outcome = auth
        .login(&request.email, &request.password)
        .await
        .map_err(to_unauthorized)?;
    let cookie = auth
        .cookies()
        .refresh_cookie(&outcome.refresh_token)
        .map_err(to_unauthorized)?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            access_token: outcome.access_token,
            user: outcome.user,
            message: "Login successful".to_string(),
            redirect: outcome.redirect,
        }),
    ))
}

/// Log out, clearing both token cookies
/// POST /accounts/logout
#[utoipa::path(
    post,
    path = "/accounts/logout",
    responses(
        (status = 200, description = "Logged out, cookies cleared", body = LogoutResponse),
        (status = 500, description = "Logout failed", body = String, example = json!({"message": "Logout failed", "error": "Internal server error"}))
    ),
    tag = "accounts"
)]
pub async fn logout_handler(State(auth): State<Arc<AuthService>>) -> Response {
    let cookies = auth.cookies();
    let cleared = cookies
        .cleared_cookie(REFRESH_COOKIE_NAME)
        .and_then(|refresh| Ok((refresh, cookies.cleared_cookie(ACCESS_COOKIE_NAME)?)));

    match cleared {
        Ok((refresh, access)) => {
            let mut headers = HeaderMap::new();
            headers.append(header::SET_COOKIE, refresh);
            headers.append(header::SET_COOKIE, access);
            (
                headers,
                Json(LogoutResponse {
                    message: "Logged out successfully".to_string(),
                    access_token: None,
                    refresh_token: None,
                }),
            )
                .into_response()
        }
        Err(err) => {
            error!("Logout failed: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "message": "Logout failed",
                    "error": "Internal server error",
                })),
            )
                .into_response()
        }
    }
}

/// Exchange the refresh cookie for a new access token, rotating the cookie
///
/// Served on both GET and POST /accounts/refresh with identical behaviour;
/// only POST is listed as a separate OpenAPI operation.
#[utoipa::path(
    post,
    path = "/accounts/refresh",
    responses(
        (status = 200, description = "New access token; refresh cookie rotated", body = RefreshResponse),
        (status = 401, description = "Missing or invalid refresh token", body = String, example = json!({"error": "Unauthorized: Invalid or expired session"})),
        (status = 500, description = "Internal server error", body = String, example = json!({"error": "Internal server error"}))
    ),
    tag = "accounts"
)]
pub async fn refresh_handler(State(auth): State<Arc<AuthService>>, headers: HeaderMap) -> Response {
    let refresh_token = get_cookie(&headers, REFRESH_COOKIE_NAME);

    let renewed = match auth.validate_and_rotate(refresh_token, RenewalPath::RefreshEndpoint) {
        Ok(renewed) => renewed,
        Err(err) => {
            warn!("Refresh rejected: {}", err);
            return session_rejection(&auth, err);
        }
    };

    let mut response = Json(RefreshResponse {
        access_token: renewed.access_token,
    })
    .into_response();

    if let Some(rotated) = renewed.refresh_token {
        match auth.cookies().refresh_cookie(&rotated) {
            Ok(cookie) => {
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
            Err(err) => return err.into_response(),
        }
    }
    response
}

/// Report whether the caller has a live session
/// GET /auth/check
#[utoipa::path(
    get,
    path = "/auth/check",
    responses(
        (status = 200, description = "Session status; never an error", body = SessionCheckResponse)
    ),
    tag = "auth"
)]
pub async fn session_check_handler(
    State(auth): State<Arc<AuthService>>,
    headers: HeaderMap,
) -> Json<SessionCheckResponse> {
    Json(auth.check_session(get_cookie(&headers, REFRESH_COOKIE_NAME)))
}

/// Create a guest account
/// POST /accounts/register
#[utoipa::path(
    post,
    path = "/accounts/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Invalid email, weak password or unreadable body", body = String, example = json!({"error": "Password must be at least 8 characters"})),
        (status = 409, description = "Email already exists", body = String, example = json!({"error": "Email already exists"}))
    ),
    tag = "accounts"
)]
pub async fn register_handler(
    State(auth): State<Arc<AuthService>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    let Json(request) = payload.map_err(|rejection| {
        debug!("Registration body rejected: {}", rejection.body_text());
        AuthError::ValidationError("Invalid request body".to_string())
    })?;
    let user = auth.register(request).await?;
    info!("Account created for {}", user.email);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Account created".to_string(),
            user,
        }),
    ))
}

/// Current user, as established by the auth gate
/// GET /accounts/me
#[utoipa::path(
    get,
    path = "/accounts/me",
    responses(
        (status = 200, description = "Authenticated identity", body = MeResponse),
        (status = 401, description = "Not logged in", body = String, example = json!({"error": "Unauthorized: Not logged in"}))
    ),
    tag = "accounts"
)]
pub async fn me_handler(identity: AuthenticatedIdentity) -> Json<MeResponse> {
    Json(MeResponse {
        id: identity.user_id,
        email: identity.email,
        role: identity.role,
    })
}
