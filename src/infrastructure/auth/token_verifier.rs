use std::collections::HashSet;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

/// The identity carried by a verified session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub user_id: Uuid,
    pub email: String,
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(rename = "userId")]
    user_id: Option<Uuid>,
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exp: Option<usize>,
}

/// Verifies HS256 session tokens. A token is accepted only if its
/// signature checks out, it isn't expired, and both `userId` and `email`
/// are present — a validly signed token missing either claim is still
/// rejected.
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.required_spec_claims = HashSet::new();
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Option<VerifiedIdentity> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).ok()?;
        let user_id = data.claims.user_id?;
        let email = data.claims.email?;
        Some(VerifiedIdentity { user_id, email })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn sign(secret: &str, claims: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_yields_identity() {
        let verifier = TokenVerifier::new("s3cret");
        let user_id = Uuid::new_v4();
        let token = sign(
            "s3cret",
            json!({ "userId": user_id, "email": "a@example.com" }),
        );
        let identity = verifier.verify(&token).unwrap();
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.email, "a@example.com");
    }

    #[test]
    fn missing_email_is_rejected_despite_valid_signature() {
        let verifier = TokenVerifier::new("s3cret");
        let token = sign("s3cret", json!({ "userId": Uuid::new_v4() }));
        assert!(verifier.verify(&token).is_none());
    }

    #[test]
    fn missing_user_id_is_rejected() {
        let verifier = TokenVerifier::new("s3cret");
        let token = sign("s3cret", json!({ "email": "a@example.com" }));
        assert!(verifier.verify(&token).is_none());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let verifier = TokenVerifier::new("s3cret");
        let token = sign(
            "different",
            json!({ "userId": Uuid::new_v4(), "email": "a@example.com" }),
        );
        assert!(verifier.verify(&token).is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let verifier = TokenVerifier::new("s3cret");
        let token = sign(
            "s3cret",
            json!({ "userId": Uuid::new_v4(), "email": "a@example.com", "exp": 1 }),
        );
        assert!(verifier.verify(&token).is_none());
    }
}
