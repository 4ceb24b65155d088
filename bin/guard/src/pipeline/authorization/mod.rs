//! Field-level access control for a parsed operation.
//!
//! 1. **Collection** - find the paths of restricted fields ([`collector::property_paths`])
//! 2. **Decision** - compare the restrictions with what the caller may see ([`decide_access`])
//! 3. **Reconstruction** - drop withheld fields from the operation ([`filter::filter`]), and
//!    optionally restore them as `null` in the result ([`nullify::ResultTransform`])

pub mod collector;
pub mod filter;
pub mod nullify;
pub mod predicates;

use tracing::debug;

use crate::{
    ast::operation::{FieldNode, FieldPath, RequestAst},
    pipeline::authorization::{
        collector::property_paths,
        filter::filter,
        predicates::{AuthenticationFields, AuthorizationFields},
    },
};

/// The predicates a guard was configured with.
pub struct AccessRules<U> {
    pub authentication_fields: Option<AuthenticationFields>,
    pub authorization_fields: Option<AuthorizationFields<U>>,
}

impl<U> Default for AccessRules<U> {
    fn default() -> Self {
        Self {
            authentication_fields: None,
            authorization_fields: None,
        }
    }
}

impl<U> AccessRules<U> {
    /// Paths of every requested field that requires authentication.
    pub fn paths_with_restriction(&self, ast: &RequestAst) -> Vec<FieldPath> {
        match &self.authentication_fields {
            Some(authentication_fields) => property_paths(ast, |field| authentication_fields(field)),
            None => vec![],
        }
    }
}

#[derive(Debug)]
pub enum AccessDecision {
    /// No requested field is restricted. The operation text is forwarded as received.
    Unrestricted,
    /// The caller may see every restricted field.
    Granted,
    /// Some fields were withheld from the caller.
    Filtered {
        ast: RequestAst,
        withheld: Vec<FieldPath>,
    },
    /// Fields would have to be withheld, but partial access is disabled.
    Reject { paths: Vec<FieldPath> },
}

/// Decides what the caller may see, given the restricted paths of `ast`.
pub fn decide_access<U>(
    ast: &RequestAst,
    paths_with_restriction: &[FieldPath],
    user: Option<&U>,
    rules: &AccessRules<U>,
    partial_access: bool,
) -> AccessDecision {
    let Some(authentication_fields) = rules
        .authentication_fields
        .as_ref()
        .filter(|_| !paths_with_restriction.is_empty())
    else {
        return AccessDecision::Unrestricted;
    };

    match (user, &rules.authorization_fields) {
        (Some(user), Some(authorization_fields)) => {
            let is_restricted = |field: &FieldNode| {
                authentication_fields(field) && !authorization_fields(field, user)
            };
            let withheld = property_paths(ast, &is_restricted);

            if withheld.is_empty() {
                return AccessDecision::Granted;
            }
            if !partial_access {
                debug!(
                    paths = ?withheld,
                    "request rejected due to unauthorized fields and partial access being disabled"
                );
                return AccessDecision::Reject { paths: withheld };
            }

            AccessDecision::Filtered {
                ast: filter(ast, |field| !is_restricted(field)),
                withheld,
            }
        }
        // Authentication alone is enough when there are no authorization rules.
        (Some(_), None) => AccessDecision::Granted,
        (None, _) => AccessDecision::Filtered {
            ast: filter(ast, |field| !authentication_fields(field)),
            withheld: paths_with_restriction.to_vec(),
        },
    }
}
