use argon2::{password_hash::{PasswordHasher, PasswordVerifier, SaltString}, Argon2, PasswordHash};
use rand::{rngs::OsRng, Rng};

use crate::errors::ServiceError;

const GENERATED_PASSWORD_LEN: usize = 8;

/// Random 8-character password for accounts that never chose one.
///
/// Each position first picks digits, upper or lower case with equal
/// probability, then a character uniformly from that alphabet.
pub fn generate_password() -> String {
    let mut rng = rand::thread_rng();
    (0..GENERATED_PASSWORD_LEN)
        .map(|_| match rng.gen_range(0..3) {
            0 => char::from(b'0' + rng.gen_range(0..10)),
            1 => char::from(b'A' + rng.gen_range(0..26)),
            _ => char::from(b'a' + rng.gen_range(0..26)),
        })
        .collect()
}

/// Argon2id hash with a fresh random salt, PHC string format.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ServiceError::Hash(e.to_string()))
}

/// Check `password` against a stored PHC hash. A malformed hash never verifies.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_password_shape() {
        for _ in 0..50 {
            let p = generate_password();
            assert_eq!(p.len(), 8);
            assert!(p.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("Passw0rd").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("Passw0rd", &hash));
        assert!(!verify_password("passw0rd", &hash));
    }

    #[test]
    fn same_password_hashes_differently() {
        assert_ne!(hash_password("x1y2z3w4").unwrap(), hash_password("x1y2z3w4").unwrap());
    }

    #[test]
    fn malformed_hash_does_not_verify() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
