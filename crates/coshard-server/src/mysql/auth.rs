//! `mysql_native_password` authentication

use rand::Rng;
use ring::digest::{SHA1_FOR_LEGACY_USE_ONLY, digest};

use super::consts::SALT_LEN;

/// Random printable salt for the initial handshake.
///
/// Bytes stay in `1..=127` and avoid `$` so clients that treat the salt as a
/// C string read it intact.
pub fn random_salt() -> [u8; SALT_LEN] {
    let mut rng = rand::thread_rng();
    let mut salt = [0u8; SALT_LEN];
    for byte in &mut salt {
        *byte = loop {
            let b: u8 = rng.gen_range(1..=127);
            if b != b'$' {
                break b;
            }
        };
    }
    salt
}

/// `SHA1(password) XOR SHA1(salt + SHA1(SHA1(password)))`
///
/// An empty password scrambles to an empty response.
pub fn scramble_password(salt: &[u8], password: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    let stage1 = digest(&SHA1_FOR_LEGACY_USE_ONLY, password);
    let stage2 = digest(&SHA1_FOR_LEGACY_USE_ONLY, stage1.as_ref());

    let mut input = Vec::with_capacity(salt.len() + stage2.as_ref().len());
    input.extend_from_slice(salt);
    input.extend_from_slice(stage2.as_ref());
    let stage3 = digest(&SHA1_FOR_LEGACY_USE_ONLY, &input);

    stage1
        .as_ref()
        .iter()
        .zip(stage3.as_ref())
        .map(|(a, b)| a ^ b)
        .collect()
}

/// Check a client's auth response against the stored password
pub fn check_password(salt: &[u8], password: &str, auth_response: &[u8]) -> bool {
    scramble_password(salt, password.as_bytes()) == auth_response
}
