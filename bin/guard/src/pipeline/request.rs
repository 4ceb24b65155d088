use ahash::HashMap;
use bytes::Bytes;
use http::{request::Parts, HeaderMap, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use crate::{ast::operation::FieldPath, pipeline::authorization::nullify::ResultTransform};

/// The GraphQL parameters of a request: `{query, operationName, variables}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLParams {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub variables: Option<Value>,
}

impl GraphQLParams {
    pub fn new(query: impl Into<String>) -> Self {
        GraphQLParams {
            query: Some(query.into()),
            ..Default::default()
        }
    }

    pub fn with_operation_name(mut self, operation_name: impl Into<String>) -> Self {
        self.operation_name = Some(operation_name.into());
        self
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }
}

/// A field location reported back to the client, with a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessNotice {
    pub message: String,
    pub path: Vec<String>,
}

impl AccessNotice {
    pub fn new(message: impl Into<String>, paths: &[FieldPath]) -> Self {
        AccessNotice {
            message: message.into(),
            path: paths.iter().map(|p| p.property.clone()).collect(),
        }
    }
}

/// The (possibly rewritten) operation handed to the execution layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardedQuery {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    #[serde(rename = "operationName", skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<AccessNotice>,
    /// To be applied by the execution layer on the final response payload.
    #[serde(skip)]
    pub transform: Option<ResultTransform>,
}

/// Every requested field was withheld. `query` is a valid operation selecting nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeniedQuery {
    pub query: String,
    pub errors: Vec<AccessNotice>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GraphQLRequestContext {
    Query(GuardedQuery),
    Denied(DeniedQuery),
}

impl GraphQLRequestContext {
    pub fn as_query(&self) -> Option<&GuardedQuery> {
        match self {
            GraphQLRequestContext::Query(query) => Some(query),
            GraphQLRequestContext::Denied(_) => None,
        }
    }

    pub fn as_denied(&self) -> Option<&DeniedQuery> {
        match self {
            GraphQLRequestContext::Query(_) => None,
            GraphQLRequestContext::Denied(denied) => Some(denied),
        }
    }
}

/// The incoming request as seen by the guard: the HTTP head, named parameter slots and the
/// `graphql` slot the guard writes its outcome into.
#[derive(Debug)]
pub struct GuardRequest {
    pub head: Parts,
    slots: HashMap<String, GraphQLParams>,
    pub graphql: Option<GraphQLRequestContext>,
}

impl Default for GuardRequest {
    fn default() -> Self {
        let (head, _) = http::Request::new(()).into_parts();
        GuardRequest::new(head)
    }
}

impl GuardRequest {
    pub fn new(head: Parts) -> Self {
        GuardRequest {
            head,
            slots: HashMap::default(),
            graphql: None,
        }
    }

    pub fn with_params(mut self, slot: impl Into<String>, params: GraphQLParams) -> Self {
        self.set_params(slot, params);
        self
    }

    pub fn set_params(&mut self, slot: impl Into<String>, params: GraphQLParams) {
        self.slots.insert(slot.into(), params);
    }

    pub fn params(&self, slot: &str) -> Option<&GraphQLParams> {
        self.slots.get(slot)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }
}

/// The outgoing response. Once a body was sent, the HTTP exchange is over.
#[derive(Debug, Default)]
pub struct GuardResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    body: Option<Bytes>,
}

impl GuardResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_sent(&self) -> bool {
        self.body.is_some()
    }

    pub fn send_json<T: Serialize>(&mut self, status: StatusCode, body: &T) {
        match serde_json::to_vec(body) {
            Ok(bytes) => {
                self.status = status;
                self.body = Some(Bytes::from(bytes));
            }
            Err(err) => {
                error!(error = %err, "failed to serialize response body");
                self.status = StatusCode::INTERNAL_SERVER_ERROR;
                self.body = Some(Bytes::new());
            }
        }
        self.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn body_json(&self) -> Option<Value> {
        self.body
            .as_ref()
            .and_then(|body| serde_json::from_slice(body).ok())
    }

    pub fn into_http_response(self) -> http::Response<Bytes> {
        let mut response = http::Response::new(self.body.unwrap_or_default());
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
