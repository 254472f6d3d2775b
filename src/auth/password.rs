//! bcrypt password hashes and session tokens.

use super::AuthError;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Work factor for new hashes. Stored hashes carry their own cost.
pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;
/// Cheapest cost bcrypt accepts; for tests.
pub const MIN_COST: u32 = bcrypt::MIN_COST;

const TOKEN_SEED_BYTES: usize = 32;

/// # Errors
///
/// Returns `AuthError::Other` if `cost` is outside bcrypt's range.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost).map_err(|e| AuthError::Other(format!("could not hash password: {e}")))
}

/// False for a wrong password and for a stored hash bcrypt cannot parse.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match bcrypt::verify(password, stored_hash) {
        Ok(matches) => matches,
        Err(e) => {
            log::warn!("unreadable password hash: {e}");
            false
        }
    }
}

/// 64 lowercase hex characters.
pub fn generate_token() -> String {
    let mut seed = [0u8; TOKEN_SEED_BYTES];
    rand::thread_rng().fill_bytes(&mut seed);
    format!("{:x}", Sha256::digest(seed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_salted_bcrypt_strings() {
        let a = hash_password("secret", MIN_COST).unwrap();
        let b = hash_password("secret", MIN_COST).unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$2"));
        assert!(!a.contains("secret"));
    }

    #[test]
    fn verify_accepts_only_the_same_password() {
        let hash = hash_password("hunter22", MIN_COST).unwrap();
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password(" hunter22", &hash));
        assert!(!verify_password("hunter22", "not-a-bcrypt-hash"));
    }

    #[test]
    fn cost_below_minimum_is_an_error() {
        assert!(matches!(hash_password("secret", 1), Err(AuthError::Other(_))));
    }

    #[test]
    fn tokens_are_random_hex() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }
}
