use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a password with Argon2id and a freshly generated salt.
///
/// The salt and parameters are embedded in the returned PHC string.
pub fn hash_password(password: &str) -> Result<String, anyhow::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against a stored PHC hash string.
pub fn verify_password(password: &str, password_hash: &str) -> Result<(), anyhow::Error> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| anyhow::anyhow!("Password verification failed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("bursar-admin-pass").expect("Failed to hash password");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("bursar-admin-pass", &hash).is_ok());
    }

    #[test]
    fn test_wrong_password_rejected() {
        let hash = hash_password("bursar-admin-pass").expect("Failed to hash password");
        assert!(verify_password("not-the-password", &hash).is_err());
    }

    #[test]
    fn test_salts_differ_between_hashes() {
        let first = hash_password("same-password").unwrap();
        let second = hash_password("same-password").unwrap();
        assert_ne!(first, second);
        assert!(verify_password("same-password", &first).is_ok());
        assert!(verify_password("same-password", &second).is_ok());
    }

    #[test]
    fn test_garbage_hash_rejected() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }
}
