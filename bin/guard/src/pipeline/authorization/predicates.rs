use std::sync::Arc;

use crate::ast::operation::FieldNode;

/// Marks a field as requiring an authenticated caller.
pub type AuthenticationFields = Arc<dyn Fn(&FieldNode) -> bool + Send + Sync>;

/// Given an authenticated caller, tells whether a field is permitted.
pub type AuthorizationFields<U> = Arc<dyn Fn(&FieldNode, &U) -> bool + Send + Sync>;

/// Matches fields carrying the `name` annotation, on the field or on its output type.
pub fn annotated(name: impl Into<String>) -> AuthenticationFields {
    let name = name.into();
    Arc::new(move |field: &FieldNode| field.metadata.has_annotation(&name))
}

/// Matches any of the given annotations.
pub fn annotated_any<I, S>(names: I) -> AuthenticationFields
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    Arc::new(move |field: &FieldNode| {
        names
            .iter()
            .any(|name| field.metadata.has_annotation(name))
    })
}

/// Permits a field unless it carries the `name` annotation and `check(body, user)` fails.
///
/// `body` is the annotation body (for `@hasRole(role: "admin")` it is `Some("admin")`).
pub fn annotation_grants<U, F>(name: impl Into<String>, check: F) -> AuthorizationFields<U>
where
    U: 'static,
    F: Fn(Option<&str>, &U) -> bool + Send + Sync + 'static,
{
    let name = name.into();
    Arc::new(move |field: &FieldNode, user: &U| {
        match field.metadata.annotation(&name) {
            Some(annotation) => check(annotation.body.as_deref(), user),
            None => true,
        }
    })
}
