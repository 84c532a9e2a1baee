use actix_web::dev::ServiceRequest;
use actix_web::{Error, HttpMessage};
use actix_web_httpauth::extractors::bearer::{BearerAuth, Config};
use actix_web_httpauth::extractors::AuthenticationError;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

/// Roles allowed to read assignment decisions.
const OPS_ROLES: [&str; 3] = ["ops", "team_lead", "manager"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,   // Subject (member id)
    pub email: String, // Member email
    pub role: String,  // ops / team_lead / manager
    pub exp: usize,    // Expiration time
    pub iat: usize,    // Issued at
}

impl Claims {
    pub fn new(member_id: String, email: String, role: String) -> Self {
        let now = chrono::Utc::now();
        let exp = (now + chrono::Duration::hours(12)).timestamp() as usize;
        let iat = now.timestamp() as usize;

        Self {
            sub: member_id,
            email,
            role,
            exp,
            iat,
        }
    }

    pub fn can_read_decisions(&self) -> bool {
        OPS_ROLES.contains(&self.role.as_str())
    }
}

pub fn create_jwt(claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
    let secret = jwt_secret();
    let encoding_key = EncodingKey::from_secret(secret.as_ref());

    encode(&Header::default(), claims, &encoding_key)
}

pub fn verify_jwt(token: &str) -> Result<TokenData<Claims>, jsonwebtoken::errors::Error> {
    let secret = jwt_secret();
    let decoding_key = DecodingKey::from_secret(secret.as_ref());
    let validation = Validation::default();

    decode::<Claims>(token, &decoding_key, &validation)
}

fn jwt_secret() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| "dev-only-jwt-secret".to_string())
}

/// Bearer validator for the ops routes.
pub async fn jwt_validator(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    match verify_jwt(credentials.token()) {
        Ok(token_data) if token_data.claims.can_read_decisions() => {
            req.extensions_mut().insert(token_data.claims);
            Ok(req)
        }
        Ok(_) => Err((
            actix_web::error::ErrorForbidden("Insufficient role for ops API"),
            req,
        )),
        Err(_) => {
            let config = req.app_data::<Config>().cloned().unwrap_or_default();
            Err((AuthenticationError::from(config).into(), req))
        }
    }
}

use actix_web::{FromRequest, HttpRequest};

impl FromRequest for Claims {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        if let Some(claims) = req.extensions().get::<Claims>() {
            ready(Ok(claims.clone()))
        } else {
            ready(Err(actix_web::error::ErrorUnauthorized("No valid token")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_round_trips_claims() {
        let claims = Claims::new("m-1".to_string(), "lead@corp.test".to_string(), "team_lead".to_string());
        let token = create_jwt(&claims).unwrap();
        let decoded = verify_jwt(&token).unwrap();
        assert_eq!(decoded.claims.email, "lead@corp.test");
        assert!(decoded.claims.can_read_decisions());
    }

    #[test]
    fn non_ops_roles_cannot_read_decisions() {
        let claims = Claims::new("m-2".to_string(), "user@corp.test".to_string(), "USER".to_string());
        assert!(!claims.can_read_decisions());
    }
}
