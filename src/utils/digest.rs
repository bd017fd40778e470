use rand::{rngs::OsRng, RngCore};

pub const SALT_LEN: usize = 16;
pub const HASH_LEN: usize = blake3::OUT_LEN;

/// generate a fresh random salt
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// cacluate [blake3] hash of a salted password
pub fn hash_password(salt: &[u8; SALT_LEN], password: &str) -> [u8; HASH_LEN] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    *hasher.finalize().as_bytes()
}

/// check `password` against a stored salted hash
///
/// compares [blake3::Hash] values, whose equality is constant time
pub fn verify_password(salt: &[u8; SALT_LEN], expected: &[u8; HASH_LEN], password: &str) -> bool {
    blake3::Hash::from(hash_password(salt, password)) == blake3::Hash::from(*expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_password() {
        let salt = generate_salt();
        let hash = hash_password(&salt, "1234abcd");
        assert!(verify_password(&salt, &hash, "1234abcd"));
        assert!(!verify_password(&salt, &hash, "otra"));
    }

    #[test]
    fn test_salt_changes_hash() {
        let a = hash_password(&[1; SALT_LEN], "secret");
        let b = hash_password(&[2; SALT_LEN], "secret");
        assert_ne!(a, b);
        assert_ne!(&a[..6], b"secret");
    }
}
