//! Credential checks, sessions and membership policy.
//!
//! All services here are synchronous and may block on the database;
//! async callers run them on a blocking thread.

pub mod authn;
pub mod error;
pub mod password;
pub mod policy;
pub mod session;

pub use authn::{AuthenticationService, NewAccount, ProfileChanges};
pub use error::{AccountError, AuthError, PolicyError, SessionError};
pub use password::PasswordHasher;
pub use policy::AuthorizationPolicy;
pub use session::{MAX_SESSION_TTL, SessionManager};
