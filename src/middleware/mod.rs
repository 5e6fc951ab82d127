// HTTP middleware for the Dashtam backend core

pub mod auth;
pub mod auth_middleware;

pub use auth::AuthenticatedUser;
pub use auth_middleware::auth_middleware;
