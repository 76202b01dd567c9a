//! X-VERIFY checksum scheme shared by every gateway exchange.
//!
//! Requests, callbacks, and status polls all carry the same integrity tag:
//!
//! ```text
//! X-VERIFY = hex(sha256(base64_payload + api_path + salt_key)) + "###" + salt_index
//! ```
//!
//! The scheme, including the literal `###` separator and the trailing salt
//! index, is the gateway's wire contract and must match it byte for byte.
//! Callbacks are signed over the payload alone (empty `api_path`); status
//! polls over an empty payload plus the status path.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Computes the `X-VERIFY` value for a base64 payload bound to `api_path`.
pub fn compute_checksum(
    base64_payload: &str,
    api_path: &str,
    salt_key: &str,
    salt_index: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(base64_payload.as_bytes());
    hasher.update(api_path.as_bytes());
    hasher.update(salt_key.as_bytes());
    format!("{}###{}", hex::encode(hasher.finalize()), salt_index)
}

/// Checks a received `X-VERIFY` value against the expected one.
///
/// The comparison runs in constant time so a caller probing the callback
/// endpoint learns nothing from response timing.
pub fn verify_checksum(
    provided: &str,
    base64_payload: &str,
    api_path: &str,
    salt_key: &str,
    salt_index: &str,
) -> bool {
    let expected = compute_checksum(base64_payload, api_path, salt_key, salt_index);
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = "eyJhIjoxfQ==";
    const SALT_KEY: &str = "test-salt-key";

    #[test]
    fn test_checksum_known_vector() {
        let checksum = compute_checksum(PAYLOAD, "/pg/v1/pay", SALT_KEY, "1");
        assert_eq!(
            checksum,
            "84bd38e0a51a0fa0bec3b9f351c8ad237c6a11725205d5667151f885ef9cd14c###1"
        );
    }

    #[test]
    fn test_checksum_empty_path_for_callbacks() {
        let checksum = compute_checksum(PAYLOAD, "", SALT_KEY, "2");
        assert_eq!(
            checksum,
            "511f3b160ee2ab93b7183682cac25713e027033d2b9db3a527b9fa7b3ee1ace6###2"
        );
    }

    #[test]
    fn test_checksum_shape() {
        let checksum = compute_checksum("payload", "/path", "salt", "1");
        let (digest, index) = checksum
            .split_once("###")
            .expect("checksum must contain the ### separator");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(index, "1");
    }

    #[test]
    fn test_verify_accepts_matching_checksum() {
        let checksum = compute_checksum(PAYLOAD, "/pg/v1/pay", SALT_KEY, "1");
        assert!(verify_checksum(
            &checksum,
            PAYLOAD,
            "/pg/v1/pay",
            SALT_KEY,
            "1"
        ));
    }

    #[test]
    fn test_verify_rejects_tampered_payload() {
        let checksum = compute_checksum(PAYLOAD, "", SALT_KEY, "1");
        assert!(!verify_checksum(&checksum, "eyJhIjoyfQ==", "", SALT_KEY, "1"));
    }

    #[test]
    fn test_verify_rejects_wrong_salt() {
        let checksum = compute_checksum(PAYLOAD, "", "other-salt", "1");
        assert!(!verify_checksum(&checksum, PAYLOAD, "", SALT_KEY, "1"));
    }

    #[test]
    fn test_verify_rejects_truncated_checksum() {
        let checksum = compute_checksum(PAYLOAD, "", SALT_KEY, "1");
        assert!(!verify_checksum(&checksum[..10], PAYLOAD, "", SALT_KEY, "1"));
    }
}
