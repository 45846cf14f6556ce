//! # JWT Authentication
//!
//! HS256 bearer tokens signed with the shared secret from configuration.
//! Claims carry the subject, a role (plus optional `roles` array and
//! space-separated `scope`), and the operator link when the account is an
//! operator.

use crate::config::AuthSettings;
use crate::error::{Result, WmsError};
use crate::models::User;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Roles granted the manager room and management endpoints.
pub const MANAGER_ROLES: [&str; 4] = ["admin", "warehouse_manager", "supervisor", "manager"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id).
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    /// Space-separated scopes, OAuth style.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "operatorId")]
    pub operator_id: Option<Uuid>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    /// All roles carried by the token, lowercased: the single `role` field,
    /// the `roles` array, and each space-separated `scope` entry.
    pub fn all_roles(&self) -> Vec<String> {
        let mut roles = Vec::new();
        if let Some(ref role) = self.role {
            roles.push(role.to_lowercase());
        }
        if let Some(ref list) = self.roles {
            roles.extend(list.iter().map(|r| r.to_lowercase()));
        }
        if let Some(ref scope) = self.scope {
            roles.extend(scope.split_whitespace().map(|r| r.to_lowercase()));
        }
        roles
    }

    pub fn is_manager(&self) -> bool {
        self.all_roles()
            .iter()
            .any(|role| MANAGER_ROLES.contains(&role.as_str()))
    }
}

#[derive(Clone)]
pub struct JwtAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime_hours: i64,
}

impl JwtAuthenticator {
    /// Build from settings. An empty secret is a configuration error; auth
    /// cannot be exercised without one.
    pub fn from_settings(settings: &AuthSettings) -> Result<Self> {
        if settings.jwt_secret.is_empty() {
            return Err(WmsError::ConfigurationError(
                "JWT secret not configured".to_string(),
            ));
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.jwt_secret.as_bytes()),
            lifetime_hours: settings.jwt_lifetime_hours,
        })
    }

    /// Issue a token for a logged-in user.
    pub fn issue_token(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            role: Some(user.role.clone()),
            roles: None,
            scope: None,
            operator_id: user.operator_id,
            exp: (now + Duration::hours(self.lifetime_hours)).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| WmsError::Internal(format!("token encoding failed: {e}")))
    }

    /// Validate a token; invalid or expired tokens are unauthorized.
    pub fn validate(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| WmsError::Unauthorized(format!("invalid token: {e}")))
    }
}

/// Extract the token from an `Authorization: Bearer ...` header value.
pub fn extract_bearer_token(auth_header: &str) -> Result<&str> {
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| WmsError::Unauthorized("authorization must use Bearer scheme".to_string()))?;
    if token.is_empty() {
        return Err(WmsError::Unauthorized("empty bearer token".to_string()));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AuthSettings {
        AuthSettings {
            jwt_secret: "test-secret".to_string(),
            jwt_lifetime_hours: 8,
            bcrypt_cost: 4,
        }
    }

    fn user(role: &str, operator_id: Option<Uuid>) -> User {
        User {
            id: Uuid::new_v4(),
            username: "tester".to_string(),
            password_hash: String::new(),
            role: role.to_string(),
            operator_id,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_secret_is_a_configuration_error() {
        let mut settings = settings();
        settings.jwt_secret.clear();
        assert!(matches!(
            JwtAuthenticator::from_settings(&settings),
            Err(WmsError::ConfigurationError(_))
        ));
    }

    #[test]
    fn issued_tokens_validate_and_round_trip_claims() {
        let auth = JwtAuthenticator::from_settings(&settings()).unwrap();
        let operator_id = Uuid::new_v4();
        let token = auth.issue_token(&user("operator", Some(operator_id))).unwrap();
        let claims = auth.validate(&token).unwrap();
        assert_eq!(claims.operator_id, Some(operator_id));
        assert_eq!(claims.role.as_deref(), Some("operator"));
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let auth = JwtAuthenticator::from_settings(&settings()).unwrap();
        let token = auth.issue_token(&user("manager", None)).unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(matches!(
            auth.validate(&tampered),
            Err(WmsError::Unauthorized(_))
        ));
    }

    #[test]
    fn roles_gather_from_all_claim_shapes_lowercased() {
        let claims = Claims {
            sub: "u".to_string(),
            role: Some("Supervisor".to_string()),
            roles: Some(vec!["Operator".to_string()]),
            scope: Some("reports:read WAREHOUSE_MANAGER".to_string()),
            operator_id: None,
            exp: 0,
            iat: 0,
        };
        let roles = claims.all_roles();
        assert!(roles.contains(&"supervisor".to_string()));
        assert!(roles.contains(&"operator".to_string()));
        assert!(roles.contains(&"warehouse_manager".to_string()));
        assert!(claims.is_manager());
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(extract_bearer_token("Bearer abc").unwrap(), "abc");
        assert!(extract_bearer_token("Basic abc").is_err());
        assert!(extract_bearer_token("Bearer ").is_err());
    }
}
