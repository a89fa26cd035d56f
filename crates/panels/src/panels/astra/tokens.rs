//! Astra request-token derivation.
//!
//! Every request to the panel must carry a family of six header values
//! derived from the hardware identifier, the account password, and the
//! current timestamp. The chain is fixed and order-sensitive: a string
//! interleaving step, base64 armoring, and a SHA3-512 digest, composed in
//! set patterns. Tokens embed the timestamp, so the family is recomputed for
//! every request rather than cached from login time.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha3::{Digest, Sha3_512};

const INFIX_HEAD: &str = "aSt";
const INFIX_TAIL: &str = "RrA";

/// The interleaving obfuscation step. Splices fixed markers into the string
/// at positions depending on its length, counted in code points so raw
/// credentials cannot land the split inside a multi-byte character.
pub fn weave(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let len = chars.len();
    let piece = |range: std::ops::Range<usize>| chars[range].iter().collect::<String>();

    if len >= 6 {
        format!(
            "{}{}{}{}{}",
            piece(0..3),
            INFIX_HEAD,
            piece(3..len - 3),
            INFIX_TAIL,
            piece(len - 3..len)
        )
    } else if len >= 3 {
        format!("{}{}{}", piece(0..3), INFIX_HEAD, piece(3..len))
    } else {
        format!("{input}{INFIX_TAIL}")
    }
}

/// Weave, base64-encode, weave again.
pub fn armor(input: &str) -> String {
    weave(&BASE64.encode(weave(input)))
}

/// Full derivation: armor the timestamped input, digest it, armor the
/// digest with the timestamp appended.
pub fn seal(input: &str, timestamp_ms: i64) -> String {
    let ts = timestamp_ms.to_string();
    let armored = armor(&format!("{input}{ts}"));
    let digest = hex::encode(Sha3_512::digest(armored.as_bytes()));
    armor(&format!("{digest}{ts}"))
}

/// The six header values accompanying every Astra request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenFamily {
    pub gc_token: String,
    pub hash: String,
    pub hash_2: String,
    pub token: String,
    pub token_2: String,
    pub token_3: String,
}

impl TokenFamily {
    /// Derive the family for (mac, password) at the given epoch-ms instant.
    pub fn derive(mac: &str, password: &str, timestamp_ms: i64) -> Self {
        let ts = timestamp_ms;
        Self {
            gc_token: seal(&format!("{mac}{ts}{}", 2 * ts), ts),
            hash: seal(&format!("{mac}___{password}"), ts),
            hash_2: seal(&format!("{mac}___{password}__{ts}"), ts),
            token: seal(&format!("{mac}{ts}"), ts),
            token_2: seal(mac, ts),
            token_3: armor(mac),
        }
    }

    /// Header name/value pairs in wire order.
    pub fn headers(&self) -> [(&'static str, &str); 6] {
        [
            ("X-Gc-Token", self.gc_token.as_str()),
            ("x-hash", self.hash.as_str()),
            ("x-hash-2", self.hash_2.as_str()),
            ("x-token", self.token.as_str()),
            ("x-token-2", self.token_2.as_str()),
            ("x-token-3", self.token_3.as_str()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weave_long_input_splices_both_markers() {
        let woven = weave("abcdefghij");
        assert_eq!(woven, "abcaStdefgRrAhij");
    }

    #[test]
    fn weave_short_inputs() {
        assert_eq!(weave("abcd"), "abcaStd");
        assert_eq!(weave("ab"), "abRrA");
        assert_eq!(weave(""), "RrA");
    }

    #[test]
    fn weave_counts_code_points_not_bytes() {
        assert_eq!(weave("héllo!"), "hélaStRrAlo!");
    }

    #[test]
    fn derivation_is_deterministic_at_fixed_timestamp() {
        let a = TokenFamily::derive("00:1a:79:aa:bb:cc", "secret", 1_700_000_000_000);
        let b = TokenFamily::derive("00:1a:79:aa:bb:cc", "secret", 1_700_000_000_000);
        assert_eq!(a, b);
    }

    #[test]
    fn timestamp_changes_all_sealed_tokens() {
        let a = TokenFamily::derive("mac", "pw", 1_700_000_000_000);
        let b = TokenFamily::derive("mac", "pw", 1_700_000_000_001);
        assert_ne!(a.gc_token, b.gc_token);
        assert_ne!(a.hash, b.hash);
        assert_ne!(a.hash_2, b.hash_2);
        assert_ne!(a.token, b.token);
        assert_ne!(a.token_2, b.token_2);
        // token_3 carries no timestamp.
        assert_eq!(a.token_3, b.token_3);
    }

    #[test]
    fn family_exposes_all_six_headers() {
        let family = TokenFamily::derive("mac", "pw", 1);
        let names: Vec<&str> = family.headers().iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            ["X-Gc-Token", "x-hash", "x-hash-2", "x-token", "x-token-2", "x-token-3"]
        );
        for (_, value) in family.headers() {
            assert!(!value.is_empty());
        }
    }

    #[test]
    fn seal_output_is_ascii_header_safe() {
        let sealed = seal("anything", 1_700_000_000_000);
        assert!(sealed.is_ascii());
        assert!(!sealed.contains('\n'));
    }
}
