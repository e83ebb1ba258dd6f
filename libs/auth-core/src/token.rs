//! Bearer token issuance and verification (HS256).

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::principal::{Principal, Role};

const DEFAULT_TTL_HOURS: i64 = 24;

/// Signed claims. Names are part of the wire contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub tenant_id: Option<String>,
    pub visible_tenant_ids: Vec<String>,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("TOKEN_SECRET environment variable is required")]
    MissingSecret,

    #[error("invalid TOKEN_TTL_HOURS: {0}")]
    InvalidTtl(String),

    #[error("failed to encode token: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

/// Stateless token service, one per process.
///
/// The secret is read once at startup; a missing secret is a fatal
/// configuration error, never a silent fallback.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Build from `TOKEN_SECRET` (required) and `TOKEN_TTL_HOURS`
    /// (default 24).
    pub fn from_env() -> Result<Self, TokenError> {
        let secret = std::env::var("TOKEN_SECRET").map_err(|_| TokenError::MissingSecret)?;
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }

        let ttl_hours = match std::env::var("TOKEN_TTL_HOURS") {
            Ok(raw) => raw
                .parse::<i64>()
                .map_err(|_| TokenError::InvalidTtl(raw))?,
            Err(_) => DEFAULT_TTL_HOURS,
        };

        Ok(Self::new(&secret, ttl_hours))
    }

    /// Issue a signed bearer token embedding the principal and its derived
    /// visibility scope.
    pub fn issue(&self, principal: &Principal) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            user_id: principal.user_id.to_string(),
            email: principal.email.clone(),
            role: principal.role,
            tenant_id: principal.tenant_id.map(|id| id.to_string()),
            visible_tenant_ids: principal
                .visible_tenant_ids
                .iter()
                .map(Uuid::to_string)
                .collect(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    /// Verify a token and rebuild the principal. Returns `None` for expired,
    /// tampered or malformed tokens.
    pub fn verify(&self, token: &str) -> Option<Principal> {
        let validation = Validation::new(Algorithm::HS256);
        let data = match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => data,
            Err(err) => {
                tracing::debug!(error = %err, "token rejected");
                return None;
            }
        };

        let claims = data.claims;
        let user_id = Uuid::parse_str(&claims.user_id).ok()?;
        let tenant_id = match claims.tenant_id {
            Some(raw) => Some(Uuid::parse_str(&raw).ok()?),
            None => None,
        };
        let visible_tenant_ids = claims
            .visible_tenant_ids
            .iter()
            .map(|raw| Uuid::parse_str(raw))
            .collect::<Result<Vec<_>, _>>()
            .ok()?;

        Some(Principal {
            user_id,
            email: claims.email,
            role: claims.role,
            tenant_id,
            visible_tenant_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn principal() -> Principal {
        let tenant = Uuid::new_v4();
        Principal {
            user_id: Uuid::new_v4(),
            email: "admin@acme.test".to_string(),
            role: Role::TenantAdmin,
            tenant_id: Some(tenant),
            visible_tenant_ids: vec![tenant, Uuid::new_v4()],
        }
    }

    #[test]
    fn round_trip_preserves_the_principal() {
        let service = TokenService::new("test-secret", 24);
        let original = principal();

        let token = service.issue(&original).unwrap();
        let verified = service.verify(&token).unwrap();

        assert_eq!(verified, original);
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let service = TokenService::new("test-secret", -1);
        let token = service.issue(&principal()).unwrap();

        assert!(service.verify(&token).is_none());
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let issuer = TokenService::new("secret-a", 24);
        let verifier = TokenService::new("secret-b", 24);

        let token = issuer.issue(&principal()).unwrap();
        assert!(verifier.verify(&token).is_none());
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        let service = TokenService::new("test-secret", 24);
        assert!(service.verify("not-a-token").is_none());
    }

    #[test]
    fn claim_names_are_stable() {
        let tenant = Uuid::new_v4();
        let claims = Claims {
            user_id: Uuid::new_v4().to_string(),
            email: "user@acme.test".to_string(),
            role: Role::User,
            tenant_id: Some(tenant.to_string()),
            visible_tenant_ids: vec![tenant.to_string()],
            iat: 1_700_000_000,
            exp: 1_700_086_400,
        };

        let value = serde_json::to_value(&claims).unwrap();
        for name in [
            "user_id",
            "email",
            "role",
            "tenant_id",
            "visible_tenant_ids",
            "iat",
            "exp",
        ] {
            assert!(value.get(name).is_some(), "missing claim {}", name);
        }
        assert_eq!(value["role"], "USER");
    }

    #[test]
    #[serial]
    fn from_env_requires_the_secret() {
        std::env::remove_var("TOKEN_SECRET");
        std::env::remove_var("TOKEN_TTL_HOURS");

        assert!(matches!(
            TokenService::from_env(),
            Err(TokenError::MissingSecret)
        ));
    }

    #[test]
    #[serial]
    fn from_env_reads_secret_and_ttl() {
        std::env::set_var("TOKEN_SECRET", "env-secret");
        std::env::set_var("TOKEN_TTL_HOURS", "2");

        let service = TokenService::from_env().unwrap();
        let token = service.issue(&principal()).unwrap();
        assert!(service.verify(&token).is_some());

        std::env::remove_var("TOKEN_SECRET");
        std::env::remove_var("TOKEN_TTL_HOURS");
    }

    #[test]
    #[serial]
    fn from_env_rejects_unparsable_ttl() {
        std::env::set_var("TOKEN_SECRET", "env-secret");
        std::env::set_var("TOKEN_TTL_HOURS", "soon");

        assert!(matches!(
            TokenService::from_env(),
            Err(TokenError::InvalidTtl(_))
        ));

        std::env::remove_var("TOKEN_SECRET");
        std::env::remove_var("TOKEN_TTL_HOURS");
    }
}
