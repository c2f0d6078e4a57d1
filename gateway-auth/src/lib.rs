//! Self-issued HS256 credential plane.
//!
//! Two creation primitives ([`CredentialPlane::issue_session`],
//! [`CredentialPlane::issue_api_key`]) and one verification primitive
//! ([`CredentialPlane::verify`]), all built over a shared JWT claim set.
//! Unlike a JWKS/OIDC validator trusting an external issuer, this system
//! signs its own tokens with a single secret derived from configuration.

pub mod claims;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod jwt;
pub mod plane;

pub use claims::{Claims, TokenType};
pub use error::SecurityError;
pub use identity::GatewayIdentity;
pub use jwt::JwtClaimsValidator;
pub use plane::CredentialPlane;

pub mod prelude {
    pub use crate::{Claims, CredentialPlane, GatewayIdentity, SecurityError, TokenType};
}
