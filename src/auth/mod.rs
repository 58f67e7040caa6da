// Authentication module
// Stateless access/refresh token sessions with the refresh token kept in an
// httpOnly cookie

pub mod cookie;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;
pub mod token;

// Re-export commonly used types
pub use cookie::CookiePolicy;
pub use error::AuthError;
pub use handlers::{
    login_handler, logout_handler, me_handler, refresh_handler, register_handler,
    session_check_handler,
};
pub use middleware::{auth_gate, AuthenticatedIdentity};
pub use models::{Role, User, UserSummary};
pub use repository::{InMemoryUserStore, PgUserRepository, UserStore};
pub use service::{AuthService, RenewalPath};
pub use token::{TokenLifetimes, TokenService};
