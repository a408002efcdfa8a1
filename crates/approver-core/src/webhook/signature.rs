//! Webhook signature verification.
//!
//! Deliveries carry `X-Hub-Signature-256: sha256=<hex HMAC-SHA256>`; the
//! legacy SHA-1 header is honoured only when the SHA-256 header is absent.
//! Comparison is constant-time over the full header string, prefix
//! included. An unconfigured secret disables verification entirely.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;
type HmacSha1 = Hmac<Sha1>;

/// Signature verification failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// A secret is configured but the delivery carries no signature header.
    #[error("missing signature header")]
    Missing,

    /// The supplied signature does not match the request body.
    #[error("signature mismatch")]
    Mismatch,
}

/// Verifies webhook deliveries against a shared secret.
pub struct SignatureVerifier {
    secret: Option<Vec<u8>>,
}

impl SignatureVerifier {
    /// Creates a verifier. `None` disables verification; the caller is
    /// expected to log that condition once at startup.
    #[must_use]
    pub fn new(secret: Option<Vec<u8>>) -> Self {
        Self { secret }
    }

    /// Returns whether deliveries are actually being verified.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Verifies `body` against the supplied signature headers.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::Missing`] when a secret is configured but
    /// no header was supplied, and [`SignatureError::Mismatch`] when the
    /// signature does not match.
    pub fn verify(
        &self,
        body: &[u8],
        sha256_header: Option<&str>,
        sha1_header: Option<&str>,
    ) -> Result<(), SignatureError> {
        let Some(secret) = &self.secret else {
            return Ok(());
        };

        let (supplied, expected) = match (sha256_header, sha1_header) {
            (Some(supplied), _) => (supplied, Self::sha256_signature(secret, body)),
            (None, Some(supplied)) => (supplied, Self::sha1_signature(secret, body)),
            (None, None) => return Err(SignatureError::Missing),
        };

        if constant_time_str_eq(supplied, &expected) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }

    fn sha256_signature(secret: &[u8], body: &[u8]) -> String {
        let mut mac =
            HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn sha1_signature(secret: &[u8], body: &[u8]) -> String {
        let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC accepts keys of any length");
        mac.update(body);
        format!("sha1={}", hex::encode(mac.finalize().into_bytes()))
    }
}

/// Constant-time equality over the full strings. Length is not secret.
fn constant_time_str_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_sha256(secret: &str, body: &[u8]) -> String {
        SignatureVerifier::sha256_signature(secret.as_bytes(), body)
    }

    fn sign_sha1(secret: &str, body: &[u8]) -> String {
        SignatureVerifier::sha1_signature(secret.as_bytes(), body)
    }

    #[test]
    fn accepts_valid_sha256_signature() {
        let verifier = SignatureVerifier::new(Some(b"topsecret".to_vec()));
        let body = br#"{"action": "opened"}"#;
        let signature = sign_sha256("topsecret", body);
        assert!(verifier.verify(body, Some(&signature), None).is_ok());
    }

    #[test]
    fn rejects_tampered_body() {
        let verifier = SignatureVerifier::new(Some(b"topsecret".to_vec()));
        let signature = sign_sha256("topsecret", b"original");
        assert_eq!(
            verifier.verify(b"tampered", Some(&signature), None),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_wrong_secret() {
        let verifier = SignatureVerifier::new(Some(b"right".to_vec()));
        let body = b"payload";
        let signature = sign_sha256("wrong", body);
        assert_eq!(
            verifier.verify(body, Some(&signature), None),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn missing_headers_fail_when_secret_is_configured() {
        let verifier = SignatureVerifier::new(Some(b"topsecret".to_vec()));
        assert_eq!(
            verifier.verify(b"payload", None, None),
            Err(SignatureError::Missing)
        );
    }

    #[test]
    fn legacy_sha1_accepted_only_without_sha256_header() {
        let verifier = SignatureVerifier::new(Some(b"topsecret".to_vec()));
        let body = b"payload";

        let sha1 = sign_sha1("topsecret", body);
        assert!(verifier.verify(body, None, Some(&sha1)).is_ok());

        // A SHA-256 header takes precedence even when a valid SHA-1 header
        // rides along.
        assert_eq!(
            verifier.verify(body, Some("sha256=bogus"), Some(&sha1)),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn unconfigured_secret_disables_verification() {
        let verifier = SignatureVerifier::new(None);
        assert!(!verifier.is_enabled());
        assert!(verifier.verify(b"anything", None, None).is_ok());
        assert!(verifier.verify(b"anything", Some("sha256=junk"), None).is_ok());
    }

    mod proptest_tests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn verification_never_panics(
                body in prop::collection::vec(any::<u8>(), 0..4096),
                header in ".*",
            ) {
                let verifier = SignatureVerifier::new(Some(b"test-secret".to_vec()));
                let _ = verifier.verify(&body, Some(&header), None);
                let _ = verifier.verify(&body, None, Some(&header));
            }
        }
    }
}
