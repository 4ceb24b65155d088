use std::sync::Arc;

use field_guard_config::FieldGuardConfig;

use crate::{
    ast::schema::SchemaAst,
    jwt::{role_grants, JwtAuthenticator, JwtError},
    pipeline::{
        authorization::predicates::{annotated_any, annotation_grants},
        error::ConfigurationError,
        FieldGuard,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum SharedStateError {
    #[error("failed to configure jwt authentication: {0}")]
    Jwt(#[from] JwtError),
    #[error("failed to configure field guard: {0}")]
    Guard(#[from] ConfigurationError),
}

pub type ConfiguredGuard = FieldGuard<Option<JwtAuthenticator>>;

pub struct GuardSharedState {
    pub guard: ConfiguredGuard,
    pub config: FieldGuardConfig,
}

impl GuardSharedState {
    pub fn new(
        schema: Arc<SchemaAst>,
        config: FieldGuardConfig,
    ) -> Result<Arc<Self>, SharedStateError> {
        let authenticator = match config.jwt.is_enabled() {
            true => Some(JwtAuthenticator::new(&config.jwt)?),
            false => None,
        };
        let annotations = &config.access.annotations;

        let guard = FieldGuard::builder(schema, authenticator)
            .policy(&config.access)
            .authentication_fields(annotated_any([
                annotations.authenticated.as_str(),
                annotations.role.as_str(),
            ]))
            .authorization_fields(annotation_grants(annotations.role.as_str(), role_grants))
            .build()?;

        Ok(Arc::new(Self { guard, config }))
    }
}
