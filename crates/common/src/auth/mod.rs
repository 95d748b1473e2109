mod identity;
mod validator;

pub use identity::{Identity, IdentityError};
pub use validator::{AuthConfigurationError, AuthenticationError, Claims, TokenValidator};
