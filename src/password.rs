//! Password hashing and verification.
//!
//! The primary scheme is PBKDF2-HMAC-SHA256 with a per-password random salt,
//! stored as `pbkdf2_sha256$<iterations>$<base64 salt>$<base64 key>`.
//! Pre-existing accounts may still carry `sha1$<salt>$<hex>` hashes from the
//! legacy importer; those are recognized but can no longer be verified and a
//! login against one always fails until the password is re-set.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use openssl::hash::MessageDigest;
use rand::RngCore;

/// PBKDF2 iteration count for newly hashed passwords.
pub const PBKDF2_ITERATIONS: u32 = 600_000;

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

const SCHEME_PBKDF2: &str = "pbkdf2_sha256";
const SCHEME_LEGACY_SHA1: &str = "sha1";

/// Result of checking a plaintext password against a stored hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The password matches the stored hash.
    Match,
    /// The hash is well-formed but the password does not match.
    Mismatch,
    /// The hash uses the legacy scheme we recognize but cannot verify.
    UnsupportedScheme,
    /// The stored value is not in any known hash format.
    Malformed,
}

impl VerifyOutcome {
    /// Whether this outcome authorizes a login.
    pub fn is_match(&self) -> bool {
        matches!(self, VerifyOutcome::Match)
    }
}

/// Hash a plaintext password with the primary scheme.
pub fn hash_password(plaintext: &str) -> Result<String, openssl::error::ErrorStack> {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);

    let mut key = [0u8; KEY_LEN];
    openssl::pkcs5::pbkdf2_hmac(
        plaintext.as_bytes(),
        &salt,
        PBKDF2_ITERATIONS as usize,
        MessageDigest::sha256(),
        &mut key,
    )?;

    Ok(format!(
        "{}${}${}${}",
        SCHEME_PBKDF2,
        PBKDF2_ITERATIONS,
        STANDARD.encode(salt),
        STANDARD.encode(key)
    ))
}

/// Verify a plaintext password against a stored hash string.
///
/// Pure function of its inputs. Derived-key comparison is constant time.
pub fn verify_password(plaintext: &str, stored: &str) -> VerifyOutcome {
    let mut parts = stored.split('$');
    let scheme = parts.next().unwrap_or("");

    match scheme {
        SCHEME_PBKDF2 => {
            let (Some(iterations), Some(salt), Some(expected), None) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                return VerifyOutcome::Malformed;
            };

            let Ok(iterations) = iterations.parse::<u32>() else {
                return VerifyOutcome::Malformed;
            };
            if iterations == 0 {
                return VerifyOutcome::Malformed;
            }

            let (Ok(salt), Ok(expected)) = (STANDARD.decode(salt), STANDARD.decode(expected))
            else {
                return VerifyOutcome::Malformed;
            };
            if expected.len() != KEY_LEN {
                return VerifyOutcome::Malformed;
            }

            let mut derived = [0u8; KEY_LEN];
            if openssl::pkcs5::pbkdf2_hmac(
                plaintext.as_bytes(),
                &salt,
                iterations as usize,
                MessageDigest::sha256(),
                &mut derived,
            )
            .is_err()
            {
                return VerifyOutcome::Malformed;
            }

            if openssl::memcmp::eq(&derived, &expected) {
                VerifyOutcome::Match
            } else {
                VerifyOutcome::Mismatch
            }
        }
        // Legacy importer hashes. The salt scheme of the old system is not
        // reproducible here, so these never verify.
        SCHEME_LEGACY_SHA1 => VerifyOutcome::UnsupportedScheme,
        _ => VerifyOutcome::Malformed,
    }
}
