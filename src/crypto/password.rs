/// Argon2id password hashing
use crate::error::{ApiError, ApiResult};
use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash,
    PasswordHasher as _, PasswordVerifier, Version,
};

/// Memory cost in KiB
const MEMORY_COST: u32 = 19 * 1024;

/// One-way password hasher; `cost` is the Argon2 time cost
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a plaintext password with a fresh random salt
    pub fn hash(&self, plaintext: &str) -> ApiResult<String> {
        let params = Params::new(MEMORY_COST, self.cost, 1, None)
            .map_err(|e| ApiError::Internal(format!("Invalid hash parameters: {}", e)))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let salt = SaltString::generate(&mut rand::thread_rng());

        argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Check a plaintext password against a stored hash.
    ///
    /// The hash string carries its own parameters, so verification works
    /// regardless of the cost it was created with.
    pub fn verify(&self, plaintext: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };
        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasher::new(1);
        let hash = hasher.hash("password123").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("password123", &hash));
        assert!(!hasher.verify("password124", &hash));
    }

    #[test]
    fn test_salts_differ() {
        let hasher = PasswordHasher::new(1);
        assert_ne!(hasher.hash("password123").unwrap(), hasher.hash("password123").unwrap());
    }

    #[test]
    fn test_unparsable_hash_fails_closed() {
        assert!(!PasswordHasher::new(1).verify("password123", "plaintext-password"));
    }
}
