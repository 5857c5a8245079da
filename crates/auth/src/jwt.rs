use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

/// Verifies a bearer token and returns its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// HMAC-SHA256 validator over a shared secret.
///
/// Time checks use the `issued_at`/`expires_at` claims rather than the
/// registered `exp`/`iat` numeric claims.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenValidationError::BadSignature,
                _ => TokenValidationError::Malformed(e.to_string()),
            }
        })?;
        validate_claims(&data.claims, now)?;
        tracing::trace!(owner_id = %data.claims.sub, "token accepted");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrolog_core::OwnerId;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn mint(secret: &str, claims: &JwtClaims) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn fresh() -> JwtClaims {
        let now = Utc::now();
        JwtClaims {
            sub: OwnerId::new(),
            issued_at: now - Duration::seconds(5),
            expires_at: now + Duration::minutes(10),
        }
    }

    #[test]
    fn accepts_token_signed_with_same_secret() {
        let claims = fresh();
        let v = Hs256JwtValidator::new(b"s3cret");
        let got = v.validate(&mint("s3cret", &claims), Utc::now()).unwrap();
        assert_eq!(got, claims);
    }

    #[test]
    fn rejects_other_secret() {
        let v = Hs256JwtValidator::new(b"s3cret");
        let err = v.validate(&mint("other", &fresh()), Utc::now()).unwrap_err();
        assert_eq!(err, TokenValidationError::BadSignature);
    }

    #[test]
    fn rejects_expired_claims() {
        let mut claims = fresh();
        claims.issued_at = Utc::now() - Duration::hours(2);
        claims.expires_at = Utc::now() - Duration::hours(1);
        let v = Hs256JwtValidator::new(b"s3cret");
        let err = v.validate(&mint("s3cret", &claims), Utc::now()).unwrap_err();
        assert_eq!(err, TokenValidationError::Expired);
    }

    #[test]
    fn garbage_is_malformed() {
        let v = Hs256JwtValidator::new(b"s3cret");
        assert!(matches!(
            v.validate("not-a-jwt", Utc::now()),
            Err(TokenValidationError::Malformed(_))
        ));
    }
}
