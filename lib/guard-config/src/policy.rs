use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How the guard treats requests that touch restricted fields.
#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AccessPolicyConfig {
    /// Name of the request slot holding the GraphQL parameters
    /// (`query`, `variables` and `operationName`).
    ///
    /// Can also be set via the `PARAMS_SLOT` environment variable.
    #[serde(default = "default_params_slot")]
    pub params_slot: String,

    /// When enabled, restricted fields are removed from the query and the remaining
    /// fields are still served. When disabled, any restriction (or a missing user)
    /// answers the request with `403 Forbidden`.
    ///
    /// Can also be set via the `PARTIAL_ACCESS` environment variable.
    #[serde(default = "default_partial_access")]
    pub partial_access: bool,

    /// When enabled, removed fields are reported back to the client as explicit `null`
    /// values instead of being absent from the response.
    ///
    /// Can also be set via the `NULLIFY_UNAUTHORIZED_FIELDS` environment variable.
    #[serde(default)]
    pub nullify_unauthorized_fields: bool,

    /// Invoke the next handler even after the guard already wrote a terminal
    /// `403`/`500` response.
    #[serde(default)]
    pub continue_after_response: bool,

    /// Schema annotations used by the built-in field predicates.
    #[serde(default)]
    pub annotations: AnnotationsConfig,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AnnotationsConfig {
    /// Directive marking a field (or a type) as visible to authenticated callers only.
    #[serde(default = "default_authenticated_annotation")]
    pub authenticated: String,

    /// Directive listing the roles allowed to see a field, for example
    /// `@hasRole(role: "admin")`. A field carrying it also requires authentication.
    #[serde(default = "default_role_annotation")]
    pub role: String,
}

fn default_params_slot() -> String {
    "params".to_string()
}

fn default_partial_access() -> bool {
    true
}

fn default_authenticated_annotation() -> String {
    "authenticated".to_string()
}

fn default_role_annotation() -> String {
    "hasRole".to_string()
}

impl Default for AccessPolicyConfig {
    fn default() -> Self {
        Self {
            params_slot: default_params_slot(),
            partial_access: default_partial_access(),
            nullify_unauthorized_fields: false,
            continue_after_response: false,
            annotations: AnnotationsConfig::default(),
        }
    }
}

impl Default for AnnotationsConfig {
    fn default() -> Self {
        Self {
            authenticated: default_authenticated_annotation(),
            role: default_role_annotation(),
        }
    }
}
