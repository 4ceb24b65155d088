use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct JwtAuthConfig {
    /// Shared HS256 secret used to verify bearer tokens.
    /// Without a secret every caller is treated as anonymous.
    ///
    /// Can also be set via the `JWT_SECRET` environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// Header carrying the token.
    #[serde(default = "default_header")]
    pub header: String,

    /// Prefix stripped from the header value before decoding.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Claim holding the caller's roles, either a string or a list of strings.
    #[serde(default = "default_roles_claim")]
    pub roles_claim: String,
}

impl Default for JwtAuthConfig {
    fn default() -> Self {
        Self {
            secret: None,
            header: default_header(),
            prefix: default_prefix(),
            roles_claim: default_roles_claim(),
        }
    }
}

impl JwtAuthConfig {
    pub fn is_enabled(&self) -> bool {
        self.secret.as_deref().is_some_and(|s| !s.is_empty())
    }
}

fn default_header() -> String {
    "authorization".to_string()
}

fn default_prefix() -> String {
    "Bearer ".to_string()
}

fn default_roles_claim() -> String {
    "roles".to_string()
}
