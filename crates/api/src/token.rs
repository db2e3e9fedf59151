//! Stateless bearer token codec.
//!
//! Tokens are compact three-part artifacts in the JWT HS256 shape:
//! `base64url(header).base64url(payload).base64url(signature)`, dot-joined
//! and unpadded. The signature is HMAC-SHA256 over `header.payload` with a
//! single symmetric secret; the same key signs and verifies, and there is
//! exactly one signing path. No server-side session state exists - a token
//! is valid purely as a function of its bytes, the secret, and the clock.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use clove_core::Role;

type HmacSha256 = Hmac<Sha256>;

/// Fixed JOSE header for every token this codec produces.
const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Reasons a token fails verification.
///
/// None of these are fatal to the process; every variant degrades to an
/// unauthenticated request at the boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Not three dot-separated segments, bad base64, or bad payload JSON.
    #[error("malformed token")]
    Malformed,
    /// Recomputed signature does not match the supplied one.
    #[error("invalid token signature")]
    InvalidSignature,
    /// `exp` is at or before the current time.
    #[error("token expired")]
    Expired,
    /// `sub` does not match the expected subject.
    #[error("token subject mismatch")]
    SubjectMismatch,
}

/// Claims carried in the token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's email.
    pub sub: String,
    /// Role at issuance time. The gate re-checks the store; this claim is
    /// informational on inbound requests.
    pub role: Role,
    /// Issued-at, integer seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, integer seconds since the Unix epoch.
    pub exp: i64,
}

/// Issues and verifies signed bearer tokens.
///
/// Pure: no side effects beyond reading the clock in the convenience
/// wrappers. Cloning is cheap enough for per-state storage (the secret is a
/// shared string).
#[derive(Clone)]
pub struct TokenCodec {
    secret: SecretString,
    ttl_secs: i64,
}

impl TokenCodec {
    /// Create a codec from the signing secret and token lifetime.
    #[must_use]
    pub const fn new(secret: SecretString, ttl_secs: i64) -> Self {
        Self { secret, ttl_secs }
    }

    /// Issue a token for `subject` with the given role, valid from `now`
    /// until `now + ttl`.
    #[must_use]
    pub fn issue_at(&self, subject: &str, role: Role, now: DateTime<Utc>) -> String {
        let claims = Claims {
            sub: subject.to_owned(),
            role,
            iat: now.timestamp(),
            exp: now.timestamp() + self.ttl_secs,
        };

        // Claims serialization cannot fail: all fields are strings/integers.
        let payload = serde_json::to_string(&claims).unwrap_or_default();

        let header_b64 = URL_SAFE_NO_PAD.encode(HEADER);
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
        let signing_input = format!("{header_b64}.{payload_b64}");
        let signature_b64 = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes()));

        format!("{signing_input}.{signature_b64}")
    }

    /// Issue a token valid from the current wall clock.
    #[must_use]
    pub fn issue(&self, subject: &str, role: Role) -> String {
        self.issue_at(subject, role, Utc::now())
    }

    /// Verify `token` against `now` and return its claims.
    ///
    /// Checks, in order: structure (three segments, valid base64/JSON),
    /// signature (constant-time comparison), expiry (no leeway), and - when
    /// `expected_subject` is supplied - the `sub` claim.
    ///
    /// # Errors
    ///
    /// Returns the first [`TokenError`] encountered.
    pub fn verify_at(
        &self,
        token: &str,
        expected_subject: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Claims, TokenError> {
        let mut segments = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenError::Malformed);
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::Malformed)?;

        // Recompute over the exact received bytes; Mac::verify_slice is a
        // constant-time comparison.
        let mut mac = self.mac();
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }

        if let Some(expected) = expected_subject
            && claims.sub != expected
        {
            return Err(TokenError::SubjectMismatch);
        }

        Ok(claims)
    }

    /// Verify `token` against the current wall clock.
    ///
    /// # Errors
    ///
    /// Returns the first [`TokenError`] encountered.
    pub fn verify(&self, token: &str, expected_subject: Option<&str>) -> Result<Claims, TokenError> {
        self.verify_at(token, expected_subject, Utc::now())
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length; new_from_slice only fails for
        // zero-capacity cases that cannot arise here.
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .unwrap_or_else(|_| HmacSha256::new_from_slice(&[0u8; 32]).expect("fixed-size key"))
    }

    fn sign(&self, input: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(input);
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn codec() -> TokenCodec {
        TokenCodec::new(
            SecretString::from("0123456789abcdef0123456789abcdef"),
            3600,
        )
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_issue_then_verify_roundtrip() {
        let codec = codec();
        let token = codec.issue_at("a@x.com", Role::User, t0());

        let claims = codec.verify_at(&token, None, t0()).unwrap();
        assert_eq!(claims.sub, "a@x.com");
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.iat, t0().timestamp());
        assert_eq!(claims.exp, t0().timestamp() + 3600);
    }

    #[test]
    fn test_token_has_three_unpadded_segments() {
        let token = codec().issue_at("a@x.com", Role::Admin, t0());
        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);
        assert!(!token.contains('='));
    }

    #[test]
    fn test_expired_token_fails_even_with_valid_signature() {
        let codec = codec();
        let token = codec.issue_at("a@x.com", Role::User, t0());

        let later = t0() + chrono::Duration::seconds(3600);
        assert_eq!(
            codec.verify_at(&token, None, later),
            Err(TokenError::Expired)
        );
        // exp boundary is exclusive: one second earlier still verifies.
        let just_before = t0() + chrono::Duration::seconds(3599);
        assert!(codec.verify_at(&token, None, just_before).is_ok());
    }

    #[test]
    fn test_flipping_any_signature_bit_fails() {
        let codec = codec();
        let token = codec.issue_at("a@x.com", Role::User, t0());

        let dot = token.rfind('.').unwrap();
        let (prefix, signature_b64) = token.split_at(dot + 1);
        let mut signature = URL_SAFE_NO_PAD.decode(signature_b64).unwrap();

        for byte in 0..signature.len() {
            for bit in 0..8 {
                signature[byte] ^= 1 << bit;
                let tampered = format!("{prefix}{}", URL_SAFE_NO_PAD.encode(&signature));
                assert_eq!(
                    codec.verify_at(&tampered, None, t0()),
                    Err(TokenError::InvalidSignature),
                    "bit {bit} of byte {byte} accepted"
                );
                signature[byte] ^= 1 << bit;
            }
        }
    }

    #[test]
    fn test_tampered_payload_fails_signature_check() {
        let codec = codec();
        let token = codec.issue_at("a@x.com", Role::User, t0());
        let parts: Vec<&str> = token.split('.').collect();

        let forged_claims = Claims {
            sub: "a@x.com".to_owned(),
            role: Role::Admin,
            iat: t0().timestamp(),
            exp: t0().timestamp() + 3600,
        };
        let forged_payload =
            URL_SAFE_NO_PAD.encode(serde_json::to_string(&forged_claims).unwrap());
        let forged = format!("{}.{forged_payload}.{}", parts[0], parts[2]);

        assert_eq!(
            codec.verify_at(&forged, None, t0()),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_wrong_part_count_is_malformed() {
        let codec = codec();
        let token = codec.issue_at("a@x.com", Role::User, t0());

        assert_eq!(
            codec.verify_at("only-one-part", None, t0()),
            Err(TokenError::Malformed)
        );
        assert_eq!(
            codec.verify_at("two.parts", None, t0()),
            Err(TokenError::Malformed)
        );
        assert_eq!(
            codec.verify_at(&format!("{token}.extra"), None, t0()),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn test_subject_mismatch() {
        let codec = codec();
        let token = codec.issue_at("a@x.com", Role::User, t0());

        assert_eq!(
            codec.verify_at(&token, Some("b@x.com"), t0()),
            Err(TokenError::SubjectMismatch)
        );
        assert!(codec.verify_at(&token, Some("a@x.com"), t0()).is_ok());
    }

    #[test]
    fn test_different_key_rejects() {
        let token = codec().issue_at("a@x.com", Role::User, t0());
        let other = TokenCodec::new(
            SecretString::from("ffffffffffffffffffffffffffffffff"),
            3600,
        );
        assert_eq!(
            other.verify_at(&token, None, t0()),
            Err(TokenError::InvalidSignature)
        );
    }
}
