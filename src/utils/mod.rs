// Utility modules for the Dashtam backend core

pub mod crypto;
pub mod password;
pub mod problem;

pub use crypto::{generate_hex_token, tokens_match, CredentialCipher, CryptoError};
pub use password::{hash_password, verify_password, PasswordError};
pub use problem::Problem;
