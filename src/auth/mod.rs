mod clock;
mod guard;
mod jwt;
mod middleware;
mod password;
mod types;

#[cfg(test)]
pub use clock::ManualClock;
pub use guard::{GuardConfig, LoginAttemptGuard};
pub use jwt::{TokenError, TokenService};
pub use middleware::AuthMiddleware;
pub use password::{hash_password, verify_password};
pub use types::{AttemptInfo, Principal};
