use sha1::{Digest, Sha1};

/// SHA-1 over the lexicographically sorted concatenation of token,
/// timestamp and nonce, hex encoded.
pub fn compute_signature(token: &str, timestamp: &str, nonce: &str) -> String {
    let mut parts = [token.trim(), timestamp.trim(), nonce.trim()];
    parts.sort_unstable();

    let mut sha = Sha1::new();
    sha.update(parts.concat());
    hex::encode(sha.finalize())
}

/// Check a WeChat `signature` query parameter against the configured token.
pub fn verify_signature(token: &str, signature: &str, timestamp: &str, nonce: &str) -> bool {
    let signature = signature.trim();
    if token.trim().is_empty() || signature.is_empty() {
        return false;
    }
    compute_signature(token, timestamp, nonce).eq_ignore_ascii_case(signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_sorted_sha1() {
        let mut parts = vec!["token123", "1700000000", "nonce123"];
        parts.sort_unstable();
        let mut sha = Sha1::new();
        sha.update(parts.join(""));
        let expected = hex::encode(sha.finalize());

        assert_eq!(compute_signature("token123", "1700000000", "nonce123"), expected);
        assert!(verify_signature("token123", &expected, "1700000000", "nonce123"));
        assert!(verify_signature(
            "token123",
            &expected.to_ascii_uppercase(),
            "1700000000",
            "nonce123"
        ));
    }

    #[test]
    fn argument_order_does_not_matter_for_digest() {
        assert_eq!(
            compute_signature("a", "b", "c"),
            compute_signature("c", "a", "b")
        );
    }

    #[test]
    fn rejects_wrong_signature_and_blank_inputs() {
        let good = compute_signature("token123", "1700000000", "nonce123");
        assert!(!verify_signature("token123", &good, "1700000001", "nonce123"));
        assert!(!verify_signature("other", &good, "1700000000", "nonce123"));
        assert!(!verify_signature("token123", "", "1700000000", "nonce123"));
        assert!(!verify_signature("", &good, "1700000000", "nonce123"));
    }
}
