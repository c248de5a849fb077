//! Session tokens: HS256 JWTs with a fixed 48-hour lifetime.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{check_email, check_user_id};

pub const ISSUER: &str = "invoicedesk";
pub const TOKEN_TTL_HOURS: i64 = 48;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is not valid yet")]
    NotYetValid,
    #[error("token is invalid")]
    InvalidToken,
    #[error("could not sign token: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);
        TokenService {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn issue(&self, subject: &str, email: &str) -> Result<String, TokenError> {
        self.issue_at(subject, email, Utc::now())
    }

    pub fn issue_at(
        &self,
        subject: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        check_user_id(subject).map_err(|err| TokenError::Signing(err.to_string()))?;
        check_email(email).map_err(|err| TokenError::Signing(err.to_string()))?;
        let claims = Claims {
            sub: subject.to_string(),
            email: email.to_string(),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| TokenError::Signing(err.to_string()))
    }

    pub fn parse(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::ImmatureSignature => TokenError::NotYetValid,
                _ => TokenError::InvalidToken,
            })
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::oid::ObjectId;

    use super::*;

    const EMAIL: &str = "ada@example.com";

    #[test]
    fn issued_token_parses_back() {
        let service = TokenService::new("top-secret");
        let subject = ObjectId::new().to_hex();
        let token = service.issue(&subject, EMAIL).unwrap();
        let claims = service.parse(&token).unwrap();
        assert_eq!(claims.sub, subject);
        assert_eq!(claims.email, EMAIL);
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_HOURS * 3600);
    }

    #[test]
    fn failures_are_classified() {
        let service = TokenService::new("top-secret");
        let subject = ObjectId::new().to_hex();

        let forged = TokenService::new("other").issue(&subject, EMAIL).unwrap();
        assert_eq!(service.parse(&forged), Err(TokenError::InvalidSignature));

        let stale = service
            .issue_at(&subject, EMAIL, Utc::now() - Duration::hours(49))
            .unwrap();
        assert_eq!(service.parse(&stale), Err(TokenError::Expired));

        let early = service
            .issue_at(&subject, EMAIL, Utc::now() + Duration::hours(1))
            .unwrap();
        assert_eq!(service.parse(&early), Err(TokenError::NotYetValid));

        assert_eq!(service.parse("not.a.jwt"), Err(TokenError::InvalidToken));
    }

    #[test]
    fn bad_subject_is_not_signed() {
        let service = TokenService::new("top-secret");
        assert!(matches!(
            service.issue("42", EMAIL),
            Err(TokenError::Signing(_))
        ));
    }
}
