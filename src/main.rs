pub mod auth;
pub mod config;
pub mod db;

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use auth::{
    auth_gate,
    handlers::{
        login_handler, logout_handler, me_handler, refresh_handler, register_handler,
        session_check_handler,
    },
    AuthService, CookiePolicy, PgUserRepository, TokenLifetimes, TokenService,
};
use config::AppConfig;

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        auth::handlers::login_handler,
        auth::handlers::logout_handler,
        auth::handlers::refresh_handler,
        auth::handlers::session_check_handler,
        auth::handlers::register_handler,
        auth::handlers::me_handler,
    ),
    components(
        schemas(
            auth::models::Role,
            auth::models::UserSummary,
            auth::models::LoginRequest,
            auth::models::LoginResponse,
            auth::models::RegisterRequest,
            auth::models::RegisterResponse,
            auth::models::RefreshResponse,
            auth::models::LogoutResponse,
            auth::models::SessionUser,
            auth::models::SessionCheckResponse,
            auth::models::MeResponse,
        )
    ),
    tags(
        (name = "accounts", description = "Login, logout, token refresh and registration"),
        (name = "auth", description = "Session status")
    ),
    info(
        title = "Booking API",
        version = "0.1.0",
        description = "Session and account endpoints for the flight and hotel booking service"
    )
)]
struct ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

/// Creates and configures the application router.
/// Routes under the auth gate only run once a session has been verified.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/accounts/me", get(me_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_gate));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/accounts/login", post(login_handler))
        .route("/accounts/logout", post(logout_handler))
        .route("/accounts/refresh", get(refresh_handler).post(refresh_handler))
        .route("/accounts/register", post(register_handler))
        .route("/auth/check", get(session_check_handler))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Booking API - Starting...");

    let config = AppConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&db_pool).await?;

    let auth = AuthService::new(
        Arc::new(PgUserRepository::new(db_pool)),
        TokenService::new(config.jwt_secret.as_bytes()),
        TokenLifetimes::default(),
        CookiePolicy::new(config.secure_cookies()),
    );
    if !config.secure_cookies() {
        tracing::warn!("APP_ENV={} - session cookies are sent without Secure", config.app_env);
    }

    let app = create_router(AppState {
        auth: Arc::new(auth),
    });

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Booking API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
