//! Password hashing and verification.
//!
//! Canonical stored form is `<hex argon2id output>.<hex salt>`. Records created
//! before hashing was introduced hold the bare secret; those compare raw (in
//! constant time) until `migrate_legacy_secrets` rewrites them.

use argon2::Argon2;
use rand::RngCore;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;

use crate::AuthError;

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 64;
const SEPARATOR: char = '.';

/// Hash a password into the canonical `hash.salt` form.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let salt_hex = hex::encode(salt);

    let digest = derive(password, &salt_hex)?;
    Ok(format!("{}{SEPARATOR}{salt_hex}", hex::encode(digest)))
}

/// Whether a stored secret predates hashing.
pub fn is_legacy_secret(stored: &str) -> bool {
    !stored.contains(SEPARATOR)
}

/// Check `supplied` against a stored secret.
///
/// Never panics; a missing or unparsable stored value is simply `false`.
pub fn verify_password(supplied: &str, stored: Option<&str>) -> bool {
    let Some(stored) = stored else {
        return false;
    };

    let Some((hash_hex, salt_hex)) = stored.split_once(SEPARATOR) else {
        // Legacy plaintext record.
        return bool::from(supplied.as_bytes().ct_eq(stored.as_bytes()));
    };

    let Ok(expected) = hex::decode(hash_hex) else {
        return false;
    };
    if expected.len() != HASH_LEN || salt_hex.is_empty() {
        return false;
    }

    match derive(supplied, salt_hex) {
        Ok(actual) => bool::from(actual.as_slice().ct_eq(expected.as_slice())),
        Err(_) => false,
    }
}

/// Like [`verify_password`], but a missing record still pays for one Argon2
/// run so unknown and known usernames take the same time to reject.
pub fn verify_password_uniform(supplied: &str, stored: Option<&str>) -> bool {
    match stored {
        Some(stored) => verify_password(supplied, Some(stored)),
        None => {
            let _ = verify_password(supplied, Some(&decoy_secret()));
            false
        }
    }
}

/// Well-formed canonical secret that no password derives to.
fn decoy_secret() -> String {
    format!(
        "{}{SEPARATOR}{}",
        "0".repeat(HASH_LEN * 2),
        "0".repeat(SALT_LEN * 2)
    )
}

/// Random secret for accounts that never log in with a password
/// (federated sign-ups). Returned already hashed.
pub fn random_secret() -> Result<String, AuthError> {
    let mut raw = [0u8; 32];
    OsRng.fill_bytes(&mut raw);
    hash_password(&hex::encode(raw))
}

fn derive(password: &str, salt: &str) -> Result<[u8; HASH_LEN], AuthError> {
    let mut out = [0u8; HASH_LEN];
    Argon2::default()
        .hash_password_into(password.as_bytes(), salt.as_bytes(), &mut out)
        .map_err(|e| AuthError::internal(format!("password hashing failed: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn missing_record_is_checked_against_a_canonical_decoy() {
        let decoy = decoy_secret();
        assert!(!is_legacy_secret(&decoy));
        let (hash_hex, salt_hex) = decoy.split_once(SEPARATOR).unwrap();
        assert_eq!(hex::decode(hash_hex).unwrap().len(), HASH_LEN);
        assert_eq!(hex::decode(salt_hex).unwrap().len(), SALT_LEN);

        assert!(!verify_password_uniform("anything", None));
        let stored = hash_password("pw-123456").unwrap();
        assert!(verify_password_uniform("pw-123456", Some(&stored)));
    }

    #[test]
    fn canonical_hash_verifies() {
        let stored = hash_password("correct horse").unwrap();
        assert!(!is_legacy_secret(&stored));
        assert!(verify_password("correct horse", Some(&stored)));
        assert!(!verify_password("correct horsf", Some(&stored)));
    }

    #[test]
    fn same_password_hashes_differently() {
        assert_ne!(hash_password("pw").unwrap(), hash_password("pw").unwrap());
    }

    #[test]
    fn missing_stored_secret_is_false() {
        assert!(!verify_password("anything", None));
        assert!(!verify_password("", None));
    }

    #[test]
    fn legacy_plaintext_compares_raw() {
        assert!(is_legacy_secret("hunter2"));
        assert!(verify_password("hunter2", Some("hunter2")));
        assert!(!verify_password("hunter3", Some("hunter2")));
        assert!(!verify_password("hunter", Some("hunter2")));
    }

    #[test]
    fn malformed_canonical_values_are_false() {
        assert!(!verify_password("pw", Some("zz.salt")));
        assert!(!verify_password("pw", Some("abcd.")));
        assert!(!verify_password("pw", Some(".")));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn any_single_bit_flip_is_rejected(
            password in "[ -~]{1,24}",
            byte_seed in any::<usize>(),
            bit in 0u8..7,
        ) {
            let stored = hash_password(&password).unwrap();
            prop_assert!(verify_password(&password, Some(&stored)));

            let mut bytes = password.clone().into_bytes();
            let idx = byte_seed % bytes.len();
            bytes[idx] ^= 1 << bit;
            // Flipping one of the low seven bits keeps the byte ASCII.
            let mutated = String::from_utf8(bytes).unwrap();
            prop_assert!(!verify_password(&mutated, Some(&stored)));
        }
    }
}
