//! Auth-domain models: scope sets, redacted secrets, and the access token produced by the code
//! exchange.

pub mod scope;
pub mod secret;
pub mod token;

pub use scope::*;
pub use secret::*;
pub use token::*;
