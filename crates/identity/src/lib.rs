//! `docflow-identity` — user identity, auth claims and the token contract.
//!
//! This crate is intentionally decoupled from HTTP and storage. Signature
//! verification and token persistence live behind the `TokenIssuer` contract;
//! only deterministic claim/lifecycle rules live here.

pub mod access;
pub mod claims;
pub mod tokens;
pub mod user;

pub use access::{ResolvedUser, UserDirectory, resolve_current_user};
pub use claims::{AuthClaims, TokenValidationError, validate_claims};
pub use tokens::{TokenConfig, TokenError, TokenIssuer, TokenPair};
pub use user::{User, UserCommand, UserEvent, UserStatus};
