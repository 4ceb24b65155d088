use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct HttpServerConfig {
    /// Interface the dry-run server listens on. Overridden by `HOST`.
    #[serde(default = "http_server_host_default")]
    host: String,

    /// Port the dry-run server listens on. Overridden by `PORT`.
    #[serde(default = "http_server_port_default")]
    port: u16,

    /// Path of the GraphQL endpoint.
    #[serde(default = "graphql_endpoint_default")]
    pub graphql_endpoint: String,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: http_server_host_default(),
            port: http_server_port_default(),
            graphql_endpoint: graphql_endpoint_default(),
        }
    }
}

fn http_server_host_default() -> String {
    "127.0.0.1".to_string()
}

fn http_server_port_default() -> u16 {
    4000
}

fn graphql_endpoint_default() -> String {
    "/graphql".to_string()
}

impl HttpServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
