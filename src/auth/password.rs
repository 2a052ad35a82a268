use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use anyhow::Context;
use rand::rngs::OsRng;
use tokio::task;
use tracing::{error, warn};

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Checks `plain` against a stored digest.
///
/// Argon2 digests carry their own variant and cost parameters in the PHC
/// string. Accounts imported from the old site still hold bcrypt digests
/// (`$2a$`, `$2b$`, `$2y$`), which are checked with bcrypt at whatever cost
/// they were written with. A digest that parses as neither yields `false`.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    if is_bcrypt(hash) {
        return match bcrypt::verify(plain, hash) {
            Ok(ok) => ok,
            Err(e) => {
                warn!(error = %e, "bcrypt parse hash error");
                false
            }
        };
    }

    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "argon2 parse hash error");
            false
        }
    }
}

/// [`hash_password`] on the blocking pool, off the async workers.
pub async fn hash_password_async(plain: String) -> anyhow::Result<String> {
    task::spawn_blocking(move || hash_password(&plain))
        .await
        .context("password hashing task failed")?
}

/// [`verify_password`] on the blocking pool, off the async workers.
pub async fn verify_password_async(plain: String, hash: String) -> anyhow::Result<bool> {
    task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .context("password verification task failed")
}

fn is_bcrypt(hash: &str) -> bool {
    ["$2a$", "$2b$", "$2y$"].iter().any(|p| hash.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::{Algorithm, Params, Version};

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("Secret123").unwrap();
        let b = hash_password("Secret123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verify_returns_false_on_malformed_hash() {
        assert!(!verify_password("anything", "not-a-valid-hash"));
        assert!(!verify_password("anything", ""));
        assert!(!verify_password("anything", "$2b$10$truncated"));
    }

    #[test]
    fn verify_honours_cost_embedded_in_digest() {
        let params = Params::new(8 * 1024, 1, 1, None).unwrap();
        let cheap = Argon2::new(Algorithm::Argon2i, Version::V0x13, params);
        let salt = SaltString::generate(&mut OsRng);
        let hash = cheap
            .hash_password(b"Secret123", &salt)
            .unwrap()
            .to_string();

        assert!(verify_password("Secret123", &hash));
        assert!(!verify_password("Secret124", &hash));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn async_variants_run_beside_other_tasks() {
        let ticker = tokio::spawn(async { tokio::task::yield_now().await });
        let hash = hash_password_async("Secret123".into()).await.unwrap();
        assert!(verify_password_async("Secret123".into(), hash.clone()).await.unwrap());
        assert!(!verify_password_async("wrong".into(), hash).await.unwrap());
        ticker.await.unwrap();
    }

    #[test]
    fn verify_accepts_legacy_bcrypt_digest() {
        let hash = bcrypt::hash("Secret123", 4).unwrap();
        assert!(verify_password("Secret123", &hash));
        assert!(!verify_password("wrong", &hash));
    }
}
