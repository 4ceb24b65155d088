pub mod authentication;
pub mod authorization;
pub mod error;
pub mod request;


use std::{panic::AssertUnwindSafe, sync::Arc};

use async_trait::async_trait;
use field_guard_config::policy::AccessPolicyConfig;
use futures::FutureExt;
use tracing::{debug, trace, Instrument};

use crate::{
    ast::{
        operation::FieldPath,
        parser::{GraphQLQueryParser, ParseOptions, QueryParser},
        render::{CompactQueryRenderer, QueryRenderer},
        schema::SchemaAst,
    },
    pipeline::{
        authentication::{authenticate, panic_message, Authenticator},
        authorization::{
            decide_access,
            nullify::ResultTransform,
            predicates::{AuthenticationFields, AuthorizationFields},
            AccessDecision, AccessRules,
        },
        error::{write_error_response, ConfigurationError, PipelineError},
        request::{
            AccessNotice, DeniedQuery, GraphQLParams, GraphQLRequestContext, GuardRequest,
            GuardResponse, GuardedQuery,
        },
    },
};

/// Operation handed downstream when every requested field was withheld.
pub const EMPTY_QUERY: &str = "query{}";
pub const ACCESS_DENIED_MESSAGE: &str = "Access denied.";
pub const FIELDS_WITHHELD_MESSAGE: &str =
    "Some requested fields were removed because the caller is not allowed to see them.";

/// The handler invoked after the guard.
#[async_trait]
pub trait Next: Send {
    async fn call(&mut self, req: &mut GuardRequest, res: &mut GuardResponse);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// The request carries no GraphQL query; nothing was attached.
    PassThrough,
    /// `req.graphql` holds the operation to execute (or the denial).
    Attached,
    /// A terminal error response (403 or 500) was written.
    Responded,
}

#[derive(Debug, Clone)]
struct GuardOptions {
    params_slot: String,
    partial_access: bool,
    nullify_unauthorized_fields: bool,
    continue_after_response: bool,
    parse_options: ParseOptions,
}

impl From<&AccessPolicyConfig> for GuardOptions {
    fn from(policy: &AccessPolicyConfig) -> Self {
        GuardOptions {
            params_slot: policy.params_slot.clone(),
            partial_access: policy.partial_access,
            nullify_unauthorized_fields: policy.nullify_unauthorized_fields,
            continue_after_response: policy.continue_after_response,
            parse_options: ParseOptions::default(),
        }
    }
}

/// Request-time field authorization for GraphQL operations.
pub struct FieldGuard<A: Authenticator> {
    schema: Arc<SchemaAst>,
    authenticator: A,
    parser: Box<dyn QueryParser>,
    renderer: Box<dyn QueryRenderer>,
    rules: AccessRules<A::User>,
    options: GuardOptions,
}

pub struct FieldGuardBuilder<A: Authenticator> {
    schema: Arc<SchemaAst>,
    authenticator: A,
    parser: Box<dyn QueryParser>,
    renderer: Box<dyn QueryRenderer>,
    rules: AccessRules<A::User>,
    options: GuardOptions,
}

impl<A: Authenticator> FieldGuardBuilder<A> {
    pub fn authentication_fields(mut self, predicate: AuthenticationFields) -> Self {
        self.rules.authentication_fields = Some(predicate);
        self
    }

    pub fn authorization_fields(mut self, predicate: AuthorizationFields<A::User>) -> Self {
        self.rules.authorization_fields = Some(predicate);
        self
    }

    /// Applies slot name, partial access, nullification and continuation settings.
    pub fn policy(mut self, policy: &AccessPolicyConfig) -> Self {
        let parse_options = self.options.parse_options;
        self.options = GuardOptions {
            parse_options,
            ..GuardOptions::from(policy)
        };
        self
    }

    pub fn params_slot(mut self, slot: impl Into<String>) -> Self {
        self.options.params_slot = slot.into();
        self
    }

    pub fn partial_access(mut self, enabled: bool) -> Self {
        self.options.partial_access = enabled;
        self
    }

    pub fn nullify_unauthorized_fields(mut self, enabled: bool) -> Self {
        self.options.nullify_unauthorized_fields = enabled;
        self
    }

    pub fn continue_after_response(mut self, enabled: bool) -> Self {
        self.options.continue_after_response = enabled;
        self
    }

    pub fn parse_options(mut self, parse_options: ParseOptions) -> Self {
        self.options.parse_options = parse_options;
        self
    }

    pub fn parser(mut self, parser: impl QueryParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    pub fn renderer(mut self, renderer: impl QueryRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    pub fn build(self) -> Result<FieldGuard<A>, ConfigurationError> {
        if self.options.params_slot.is_empty() {
            return Err(ConfigurationError::EmptyParamsSlot);
        }
        if self.rules.authorization_fields.is_some() && self.rules.authentication_fields.is_none()
        {
            return Err(ConfigurationError::AuthorizationWithoutAuthentication);
        }

        Ok(FieldGuard {
            schema: self.schema,
            authenticator: self.authenticator,
            parser: self.parser,
            renderer: self.renderer,
            rules: self.rules,
            options: self.options,
        })
    }
}

impl<A: Authenticator> FieldGuard<A> {
    pub fn builder(schema: Arc<SchemaAst>, authenticator: A) -> FieldGuardBuilder<A> {
        FieldGuardBuilder {
            schema,
            authenticator,
            parser: Box::new(GraphQLQueryParser),
            renderer: Box::new(CompactQueryRenderer),
            rules: AccessRules::default(),
            options: GuardOptions::from(&AccessPolicyConfig::default()),
        }
    }

    pub fn params_slot(&self) -> &str {
        &self.options.params_slot
    }

    /// Runs the guard, then `next`.
    ///
    /// `next` is skipped after a terminal error response, unless the guard was built with
    /// `continue_after_response`.
    pub async fn handle<N>(
        &self,
        req: &mut GuardRequest,
        res: &mut GuardResponse,
        next: &mut N,
    ) -> GuardOutcome
    where
        N: Next + ?Sized,
    {
        let outcome = self.process(req, res).await;

        if outcome != GuardOutcome::Responded || self.options.continue_after_response {
            next.call(req, res).await;
        } else {
            trace!("terminal response written, skipping the next handler");
        }

        outcome
    }

    /// Runs the guard without invoking a continuation.
    ///
    /// Never fails: errors and panics are written to `res` as `403`/`500` responses.
    pub async fn process(&self, req: &mut GuardRequest, res: &mut GuardResponse) -> GuardOutcome {
        let span = tracing::debug_span!("field_guard", slot = self.options.params_slot.as_str());

        let result = AssertUnwindSafe(self.try_process(req).instrument(span))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(PipelineError::Unhandled(panic_message(&*panic))));

        match result {
            Ok(Some(context)) => {
                req.graphql = Some(context);
                GuardOutcome::Attached
            }
            Ok(None) => GuardOutcome::PassThrough,
            Err(err) => {
                write_error_response(res, &err);
                GuardOutcome::Responded
            }
        }
    }

    async fn try_process(
        &self,
        req: &GuardRequest,
    ) -> Result<Option<GraphQLRequestContext>, PipelineError> {
        let Some(params) = req.params(&self.options.params_slot) else {
            trace!("no parameters in slot, passing through");
            return Ok(None);
        };
        let Some(query) = params.query.as_deref().filter(|q| !q.trim().is_empty()) else {
            trace!("no query text, passing through");
            return Ok(None);
        };

        let ast = self
            .parser
            .parse(
                query,
                params.operation_name.as_deref(),
                &self.schema,
                &self.options.parse_options,
            )
            .map_err(PipelineError::FailedToParseOperation)?;
        let paths_with_restriction = self.rules.paths_with_restriction(&ast);
        debug!(
            restricted = paths_with_restriction.len(),
            "collected restricted paths"
        );

        let auth = authenticate(&self.authenticator, req).await;
        let user = auth.user();

        if !self.options.partial_access && user.is_none() {
            debug!("unauthenticated request rejected, partial access is disabled");
            return Err(PipelineError::AccessDenied);
        }

        let context = match decide_access(
            &ast,
            &paths_with_restriction,
            user,
            &self.rules,
            self.options.partial_access,
        ) {
            AccessDecision::Unrestricted => self.guarded_query(params, query.to_string(), &[]),
            AccessDecision::Granted => self.guarded_query(params, self.renderer.render(&ast), &[]),
            AccessDecision::Reject { .. } => return Err(PipelineError::AccessDenied),
            AccessDecision::Filtered { ast, withheld } if ast.is_empty() => {
                debug!(withheld = withheld.len(), "every requested field was withheld");
                GraphQLRequestContext::Denied(DeniedQuery {
                    query: EMPTY_QUERY.to_string(),
                    errors: vec![AccessNotice::new(
                        ACCESS_DENIED_MESSAGE,
                        &paths_with_restriction,
                    )],
                })
            }
            AccessDecision::Filtered { ast, withheld } => {
                debug!(withheld = withheld.len(), "restricted fields withheld");
                self.guarded_query(params, self.renderer.render(&ast), &withheld)
            }
        };

        Ok(Some(context))
    }

    fn guarded_query(
        &self,
        params: &GraphQLParams,
        query: String,
        withheld: &[FieldPath],
    ) -> GraphQLRequestContext {
        let mut guarded = GuardedQuery {
            query,
            variables: params.variables.clone(),
            operation_name: params.operation_name.clone(),
            warnings: vec![],
            transform: None,
        };

        if !withheld.is_empty() {
            guarded.warnings = vec![AccessNotice::new(FIELDS_WITHHELD_MESSAGE, withheld)];
            if self.options.nullify_unauthorized_fields {
                guarded.transform = Some(ResultTransform::new(withheld.to_vec()));
            }
        }

        GraphQLRequestContext::Query(guarded)
    }
}
