use std::error::Error;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{ast::parser::ParseError, pipeline::request::GuardResponse};

/// Raised while building a guard. Setup cannot proceed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("authorization_fields requires authentication_fields to be configured")]
    AuthorizationWithoutAuthentication,
    #[error("The parameter slot name must not be empty")]
    EmptyParamsSlot,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Access denied.")]
    AccessDenied,
    #[error("Failed to parse GraphQL request payload")]
    FailedToParseBody(#[source] serde_json::Error),
    #[error("Request does not contain a GraphQL operation")]
    MissingOperation,
    #[error("Failed to parse GraphQL operation")]
    FailedToParseOperation(#[source] ParseError),
    #[error("Unexpected error: {0}")]
    Unhandled(String),
}

impl PipelineError {
    pub fn default_status_code(&self) -> StatusCode {
        match self {
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::FailedToParseBody(_) | Self::MissingOperation => StatusCode::BAD_REQUEST,
            Self::FailedToParseOperation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unhandled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The error message followed by its chain of causes, one per line.
    pub fn graphql_error_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            message.push_str("\ncaused by: ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GraphQLErrorLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<GraphQLErrorLocation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<String>>,
}

impl GraphQLError {
    pub fn from_message(message: impl Into<String>) -> Self {
        GraphQLError {
            message: message.into(),
            locations: None,
            path: None,
        }
    }
}

impl From<&PipelineError> for GraphQLError {
    fn from(err: &PipelineError) -> Self {
        GraphQLError::from_message(err.graphql_error_message())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FailedExecutionResult {
    pub errors: Vec<GraphQLError>,
}

/// Writes `{errors: [{message}]}` with the error's default status code.
pub fn write_error_response(res: &mut GuardResponse, err: &PipelineError) {
    write_error_response_with_status(res, err, err.default_status_code());
}

pub fn write_error_response_with_status(
    res: &mut GuardResponse,
    err: &PipelineError,
    status: StatusCode,
) {
    if status.is_server_error() {
        error!(error = %err, status = status.as_u16(), "request failed");
    }

    let result = FailedExecutionResult {
        errors: vec![GraphQLError::from(err)],
    };
    res.send_json(status, &result);
}
