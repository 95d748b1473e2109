pub mod auth;
pub mod env_const;
pub mod ident;
pub mod logging_tracing;

pub use auth::{AuthenticationError, Claims, Identity, IdentityError, TokenValidator};
pub use ident::normalize_ident;
