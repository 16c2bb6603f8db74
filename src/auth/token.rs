//! HS256 JSON Web Tokens
//!
//! Signature and header checks go through `jsonwebtoken`; expiry is checked
//! here against a caller-supplied clock.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::identity::{AuthenticatedIdentity, Role};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Token expired")]
    Expired,

    #[error("Malformed token: {0}")]
    Malformed(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

/// Claims carried in the token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    /// Expiration, unix seconds
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl Claims {
    pub fn new(sub: impl Into<String>, role: Role, exp: i64) -> Self {
        Self {
            sub: sub.into(),
            role: role.as_str().to_string(),
            exp,
            iat: None,
        }
    }
}

/// Verifies and signs tokens with a shared secret.
///
/// Verification is a pure function of (token, secret, now).
#[derive(Clone)]
pub struct TokenVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    leeway_secs: i64,
}

impl TokenVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();

        // Expiry is checked in `verify` against the injected clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            leeway_secs: 0,
        }
    }

    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = i64::try_from(leeway_secs).unwrap_or(i64::MAX);
        self
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)?)
    }

    /// Verify a raw token at time `now`.
    ///
    /// The signature is checked before the claims are trusted, so a forged
    /// expired token reports `InvalidSignature` rather than `Expired`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<AuthenticatedIdentity, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)?.claims;

        let role: Role = claims
            .role
            .parse()
            .map_err(|e| TokenError::Malformed(format!("{}", e)))?;

        if now.timestamp() >= claims.exp.saturating_add(self.leeway_secs) {
            return Err(TokenError::Expired);
        }

        Ok(AuthenticatedIdentity {
            subject: claims.sub,
            role,
            expires_at: claims.exp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "test-secret-key-that-is-at-least-32-bytes";

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(SECRET)
    }

    /// The claims segment of a signed token
    fn claims_segment(token: &str) -> &str {
        token.split('.').nth(1).unwrap()
    }

    #[test]
    fn test_sign_and_verify() {
        let token = verifier()
            .sign(&Claims::new("U1", Role::Buyer, 2_000))
            .unwrap();

        let identity = verifier().verify(&token, at(1_000)).unwrap();

        assert_eq!(identity.subject, "U1");
        assert_eq!(identity.role, Role::Buyer);
        assert_eq!(identity.expires_at, 2_000);
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let token = verifier().sign(&Claims::new("U1", Role::Buyer, 1_000)).unwrap();

        assert!(verifier().verify(&token, at(999)).is_ok());
        assert_eq!(verifier().verify(&token, at(1_000)), Err(TokenError::Expired));
    }

    #[test]
    fn test_leeway_extends_expiry() {
        let token = verifier().sign(&Claims::new("U1", Role::Buyer, 1_000)).unwrap();
        let lenient = verifier().with_leeway(30);

        assert!(lenient.verify(&token, at(1_029)).is_ok());
        assert_eq!(lenient.verify(&token, at(1_030)), Err(TokenError::Expired));
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let token = TokenVerifier::new("another-secret-key-of-sufficient-length!")
            .sign(&Claims::new("U1", Role::Admin, 2_000))
            .unwrap();

        assert_eq!(
            verifier().verify(&token, at(1_000)),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_forged_expired_token_reports_signature() {
        let token = TokenVerifier::new("another-secret-key-of-sufficient-length!")
            .sign(&Claims::new("U1", Role::Admin, 10))
            .unwrap();

        assert_eq!(
            verifier().verify(&token, at(1_000)),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let token = verifier().sign(&Claims::new("U1", Role::Buyer, 2_000)).unwrap();
        let admin = verifier().sign(&Claims::new("U1", Role::Admin, 2_000)).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], claims_segment(&admin), parts[2]);

        assert_eq!(
            verifier().verify(&forged, at(1_000)),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_alg_none_is_malformed() {
        // {"alg":"none","typ":"JWT"}
        let header = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0";
        let admin = verifier().sign(&Claims::new("U1", Role::Admin, 2_000)).unwrap();
        let token = format!("{}.{}.", header, claims_segment(&admin));

        assert!(matches!(
            verifier().verify(&token, at(1_000)),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        for token in ["", "abc", "a.b", "a.b.c.d", "!!!.???.***"] {
            assert!(
                matches!(verifier().verify(token, at(0)), Err(TokenError::Malformed(_))),
                "token {:?}",
                token
            );
        }
    }

    #[test]
    fn test_unknown_role_is_malformed() {
        let claims = Claims {
            sub: "U1".to_string(),
            role: "SUPERUSER".to_string(),
            exp: 2_000,
            iat: None,
        };
        let token = verifier().sign(&claims).unwrap();

        assert!(matches!(
            verifier().verify(&token, at(1_000)),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_tokens_from_other_hs256_issuers() {
        use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

        let exp = Utc::now().timestamp() + 3_600;
        let claims = Claims {
            sub: "V7".to_string(),
            role: "provider".to_string(),
            exp,
            iat: Some(exp - 3_600),
        };

        let foreign = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        let identity = verifier().verify(&foreign, Utc::now()).unwrap();
        assert_eq!(identity.role, Role::Vendor);
        assert_eq!(identity.subject, "V7");

        let ours = verifier().sign(&claims).unwrap();
        let decoded = decode::<Claims>(
            &ours,
            &DecodingKey::from_secret(SECRET.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();
        assert_eq!(decoded.claims, claims);
    }
}
