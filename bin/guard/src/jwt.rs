use async_trait::async_trait;
use field_guard_config::jwt_auth::JwtAuthConfig;
use http::header::{HeaderName, InvalidHeaderName};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::pipeline::{
    authentication::{AuthenticationError, Authenticator},
    request::GuardRequest,
};

type JwtClaims = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("invalid token header name '{0}': {1}")]
    InvalidHeaderName(String, #[source] InvalidHeaderName),
    #[error("jwt authentication is enabled but no secret is configured")]
    MissingSecret,
    #[error("token header value is not valid ascii")]
    InvalidHeaderValue,
    #[error("token is missing the expected '{0}' prefix")]
    MissingPrefix(String),
    #[error("failed to decode token: {0}")]
    FailedToDecodeToken(jsonwebtoken::errors::Error),
}

impl From<JwtError> for AuthenticationError {
    fn from(err: JwtError) -> Self {
        AuthenticationError::InvalidCredentials(err.to_string())
    }
}

/// The caller described by a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardUser {
    pub subject: Option<String>,
    pub roles: Vec<String>,
}

impl GuardUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Grants a role annotation when the caller holds one of the comma-separated roles in its body.
///
/// An annotation without a body only requires an authenticated caller.
pub fn role_grants(body: Option<&str>, user: &GuardUser) -> bool {
    match body {
        Some(body) => body
            .split(',')
            .map(str::trim)
            .filter(|role| !role.is_empty())
            .any(|role| user.has_role(role)),
        None => true,
    }
}

/// Verifies HS256 bearer tokens against a shared secret.
pub struct JwtAuthenticator {
    header: HeaderName,
    prefix: String,
    roles_claim: String,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    pub fn new(config: &JwtAuthConfig) -> Result<Self, JwtError> {
        let secret = config
            .secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .ok_or(JwtError::MissingSecret)?;
        let header = HeaderName::from_bytes(config.header.as_bytes())
            .map_err(|e| JwtError::InvalidHeaderName(config.header.clone(), e))?;

        Ok(JwtAuthenticator {
            header,
            prefix: config.prefix.clone(),
            roles_claim: config.roles_claim.clone(),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        })
    }

    fn lookup<'a>(&self, req: &'a GuardRequest) -> Result<Option<&'a str>, JwtError> {
        let Some(value) = req.headers().get(&self.header) else {
            return Ok(None);
        };
        let value = value.to_str().map_err(|_| JwtError::InvalidHeaderValue)?;

        value
            .strip_prefix(self.prefix.as_str())
            .map(|token| Some(token.trim()))
            .ok_or_else(|| JwtError::MissingPrefix(self.prefix.clone()))
    }

    fn decode_user(&self, token: &str) -> Result<GuardUser, JwtError> {
        let token_data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map_err(JwtError::FailedToDecodeToken)?;
        let claims = token_data.claims;

        let roles = match claims.get(&self.roles_claim) {
            Some(Value::String(role)) => vec![role.clone()],
            Some(Value::Array(roles)) => roles
                .iter()
                .filter_map(|role| role.as_str().map(str::to_string))
                .collect(),
            _ => vec![],
        };
        let subject = claims.get("sub").and_then(Value::as_str).map(str::to_string);

        Ok(GuardUser { subject, roles })
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    type User = GuardUser;

    async fn authenticate(
        &self,
        req: &GuardRequest,
    ) -> Result<Option<Self::User>, AuthenticationError> {
        let Some(token) = self.lookup(req)? else {
            trace!(header = %self.header, "no token found");
            return Ok(None);
        };

        let user = self.decode_user(token)?;
        debug!(subject = ?user.subject, roles = ?user.roles, "token verified");

        Ok(Some(user))
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    use super::*;
    use crate::ast::schema::SchemaAst;

    const SECRET: &str = "top-secret";
    // 2100-01-01
    const EXP: u64 = 4102444800;

    fn config() -> JwtAuthConfig {
        JwtAuthConfig {
            secret: Some(SECRET.to_string()),
            ..JwtAuthConfig::default()
        }
    }

    fn token(claims: Value, secret: &str) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn request_with(header_value: &str) -> GuardRequest {
        let (head, _) = http::Request::builder()
            .header("authorization", header_value)
            .body(())
            .unwrap()
            .into_parts();
        GuardRequest::new(head)
    }

    #[tokio::test]
    async fn reads_subject_and_roles() {
        let authenticator = JwtAuthenticator::new(&config()).unwrap();
        let jwt = token(
            json!({ "sub": "u1", "roles": ["admin", "editor"], "exp": EXP }),
            SECRET,
        );

        let user = authenticator
            .authenticate(&request_with(&format!("Bearer {}", jwt)))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(user.subject.as_deref(), Some("u1"));
        assert_eq!(user.roles, vec!["admin", "editor"]);
    }

    #[tokio::test]
    async fn accepts_single_role_claim() {
        let authenticator = JwtAuthenticator::new(&config()).unwrap();
        let jwt = token(json!({ "roles": "admin", "exp": EXP }), SECRET);

        let user = authenticator
            .authenticate(&request_with(&format!("Bearer {}", jwt)))
            .await
            .unwrap()
            .unwrap();

        assert!(user.has_role("admin"));
        assert_eq!(user.subject, None);
    }

    #[tokio::test]
    async fn missing_header_is_anonymous() {
        let authenticator = JwtAuthenticator::new(&config()).unwrap();

        let result = authenticator.authenticate(&GuardRequest::default()).await;

        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn rejects_bad_tokens() {
        let authenticator = JwtAuthenticator::new(&config()).unwrap();
        let wrong_secret = token(json!({ "exp": EXP }), "another-secret");
        let expired = token(json!({ "exp": 1 }), SECRET);

        for value in [
            format!("Bearer {}", wrong_secret),
            format!("Bearer {}", expired),
            format!("Token {}", token(json!({ "exp": EXP }), SECRET)),
        ] {
            let result = authenticator.authenticate(&request_with(&value)).await;
            assert!(
                matches!(result, Err(AuthenticationError::InvalidCredentials(_))),
                "expected '{}' to be rejected",
                value
            );
        }
    }

    #[test]
    fn requires_a_secret() {
        let result = JwtAuthenticator::new(&JwtAuthConfig::default());

        assert!(matches!(result, Err(JwtError::MissingSecret)));
    }

    #[test]
    fn role_grants_checks_any_listed_role() {
        let user = GuardUser {
            subject: None,
            roles: vec!["editor".to_string()],
        };

        assert!(role_grants(Some("admin, editor"), &user));
        assert!(!role_grants(Some("admin"), &user));
        assert!(role_grants(None, &user));
    }

    #[test]
    fn role_grants_reads_list_annotations() {
        let schema = SchemaAst::parse(
            r#"
            type Query { products: [Product] }
            type Product { id: ID, owner: String @hasRole(roles: ["admin", "editor"]) }
            "#,
        )
        .unwrap();
        let owner = schema.field("Product", "owner").unwrap();
        let body = owner.annotation("hasRole").and_then(|a| a.body.as_deref());
        let admin = GuardUser {
            subject: None,
            roles: vec!["admin".to_string()],
        };
        let viewer = GuardUser {
            subject: None,
            roles: vec!["viewer".to_string()],
        };

        assert!(role_grants(body, &admin));
        assert!(!role_grants(body, &viewer));
    }
}
