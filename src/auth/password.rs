//! Password hashing
//!
//! PBKDF2-HMAC-SHA256 with a per-user random salt. Hashes are stored as
//! `pbkdf2-sha256$<iterations>$<salt-hex>$<digest-hex>` so the round count can
//! be raised later without invalidating existing users.

use rand::RngCore;
use sha2::Sha256;
use std::hint::black_box;
use subtle::ConstantTimeEq;

const SCHEME: &str = "pbkdf2-sha256";

/// Salt byte length for password hashing.
const SALT_BYTES: usize = 16;

/// Derived key length.
const DIGEST_BYTES: usize = 32;

/// Hash a secret with a freshly generated salt.
pub fn hash_password(secret: &str, iterations: u32) -> String {
    let mut salt = [0u8; SALT_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    encode(secret, &salt, iterations)
}

/// Check a secret against a stored hash string.
///
/// A hash with fewer rounds than `min_iterations` is padded with dummy
/// rounds, so every known user costs at least as much as an unknown one.
/// Malformed stored hashes never verify.
pub fn verify_password(secret: &str, stored: &str, min_iterations: u32) -> bool {
    let Some((iterations, salt, expected)) = decode(stored) else {
        dummy_verify(secret, min_iterations);
        return false;
    };
    let actual = derive(secret, &salt, iterations);
    if iterations < min_iterations {
        dummy_verify(secret, min_iterations - iterations);
    }
    actual.as_slice().ct_eq(expected.as_slice()).into()
}

/// Whether `stored` was hashed with a round count other than `iterations`.
pub fn needs_rehash(stored: &str, iterations: u32) -> bool {
    match decode(stored) {
        Some((stored_iterations, _, _)) => stored_iterations != iterations,
        None => true,
    }
}

/// Burn the same CPU as a real verification; used when the user is unknown.
pub fn dummy_verify(secret: &str, iterations: u32) {
    black_box(derive(black_box(secret), &[0u8; SALT_BYTES], iterations));
}

fn encode(secret: &str, salt: &[u8], iterations: u32) -> String {
    let digest = derive(secret, salt, iterations);
    format!(
        "{}${}${}${}",
        SCHEME,
        iterations,
        hex::encode(salt),
        hex::encode(digest)
    )
}

fn decode(stored: &str) -> Option<(u32, Vec<u8>, Vec<u8>)> {
    let mut parts = stored.split('$');
    if parts.next()? != SCHEME {
        return None;
    }
    let iterations: u32 = parts.next()?.parse().ok()?;
    let salt = hex::decode(parts.next()?).ok()?;
    let digest = hex::decode(parts.next()?).ok()?;
    if parts.next().is_some() || iterations == 0 || digest.len() != DIGEST_BYTES {
        return None;
    }
    Some((iterations, salt, digest))
}

fn derive(secret: &str, salt: &[u8], iterations: u32) -> [u8; DIGEST_BYTES] {
    let mut out = [0u8; DIGEST_BYTES];
    pbkdf2::pbkdf2_hmac::<Sha256>(secret.as_bytes(), salt, iterations, &mut out);
    out
}
