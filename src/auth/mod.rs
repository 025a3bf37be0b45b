//! Authentication: password hashing, session tokens and the bearer extractor.

pub mod extractors;
pub mod password;
pub mod session;
pub mod token;

pub use extractors::AuthUser;
pub use password::{PasswordConfig, PasswordHasher};
pub use session::{SessionClaims, SessionIssuer, SessionVerifier};
pub use token::TokenExtractor;
