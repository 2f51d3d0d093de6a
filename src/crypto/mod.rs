/// Cryptographic primitives for the session lifecycle
///
/// Signed token encoding for access and refresh credentials, plus one-way
/// password hashing. Both are stateless over the configured secrets.

pub mod jwt;
pub mod password;

pub use jwt::{AccessClaims, RefreshClaims, TokenCodec};
pub use password::PasswordHasher;
