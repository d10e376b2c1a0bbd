use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const API_KEY_PREFIX: &str = "sk-";

/// Hash a gateway key as `hex(HMAC-SHA256(secret, key))`
///
/// This is the value stored in API-key records; raw keys are never kept.
pub fn hash_api_key(secret: &str, key: &str) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC can take key of any size"),
    };
    mac.update(key.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// A gateway key is `sk-` followed by at least one visible ASCII character
pub fn is_valid_api_key_format(key: &str) -> bool {
    key.strip_prefix(API_KEY_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_graphic()))
}

/// Short prefix of a key hash, safe to put in logs
pub fn key_hash_prefix(key_hash: &str) -> &str {
    key_hash.get(..8).unwrap_or(key_hash)
}

/// Masked form of a secret showing only its last four characters
pub fn secret_hint(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}
