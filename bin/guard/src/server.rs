use std::sync::Arc;

use async_trait::async_trait;
use field_guard_config::FieldGuardConfig;
use http::{header::CONTENT_TYPE, request::Parts, HeaderName, HeaderValue, StatusCode};
use ntex::{
    http::ResponseBuilder,
    util::Bytes,
    web::{self, HttpRequest, Responder},
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    ast::operation::FieldPath,
    pipeline::{
        error::{write_error_response, PipelineError},
        request::{GraphQLParams, GraphQLRequestContext, GuardRequest, GuardResponse},
        Next,
    },
    shared_state::GuardSharedState,
};

/// What the dry-run server answers with instead of executing the operation.
#[derive(Debug, Serialize)]
pub struct DryRunReport<'a> {
    pub graphql: &'a GraphQLRequestContext,
    #[serde(rename = "nullifiedPaths", skip_serializing_if = "Option::is_none")]
    pub nullified_paths: Option<&'a [FieldPath]>,
}

/// Stands in for the execution layer: echoes the attached context back to the client.
struct DryRunNext;

#[async_trait]
impl Next for DryRunNext {
    async fn call(&mut self, req: &mut GuardRequest, res: &mut GuardResponse) {
        if res.is_sent() {
            return;
        }

        match req.graphql.as_ref() {
            Some(context) => {
                let nullified_paths = context
                    .as_query()
                    .and_then(|query| query.transform.as_ref())
                    .map(|transform| transform.paths());
                res.send_json(
                    StatusCode::OK,
                    &DryRunReport {
                        graphql: context,
                        nullified_paths,
                    },
                );
            }
            None => write_error_response(res, &PipelineError::MissingOperation),
        }
    }
}

fn request_head(request: &HttpRequest) -> Result<Parts, http::Error> {
    let mut builder = http::Request::builder()
        .method(request.method().as_str())
        .uri(request.uri().to_string());

    for (name, value) in request.headers().iter() {
        builder = builder.header(
            HeaderName::from_bytes(name.as_str().as_bytes())?,
            HeaderValue::from_bytes(value.as_bytes())?,
        );
    }

    let (head, _) = builder.body(())?.into_parts();
    Ok(head)
}

async fn run_guard(
    request: &HttpRequest,
    body_bytes: &Bytes,
    state: &GuardSharedState,
) -> GuardResponse {
    let mut res = GuardResponse::new();

    let head = match request_head(request) {
        Ok(head) => head,
        Err(err) => {
            warn!(error = %err, "failed to read request head");
            write_error_response(&mut res, &PipelineError::Unhandled(err.to_string()));
            return res;
        }
    };

    let params = match serde_json::from_slice::<GraphQLParams>(body_bytes) {
        Ok(params) => params,
        Err(err) => {
            debug!(error = %err, "failed to parse request body");
            write_error_response(&mut res, &PipelineError::FailedToParseBody(err));
            return res;
        }
    };

    let mut req = GuardRequest::new(head).with_params(state.guard.params_slot(), params);
    let outcome = state.guard.handle(&mut req, &mut res, &mut DryRunNext).await;
    debug!(?outcome, status = res.status.as_u16(), "guard finished");

    res
}

pub async fn graphql_endpoint_handler(
    request: HttpRequest,
    body_bytes: Bytes,
    app_state: web::types::State<Arc<GuardSharedState>>,
) -> impl Responder {
    let res = run_guard(&request, &body_bytes, app_state.get_ref()).await;
    let status = res.status;
    let body = res.body().map(|body| body.to_vec()).unwrap_or_default();

    ResponseBuilder::new(status)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
}

pub async fn health_check_handler() -> impl Responder {
    web::HttpResponse::Ok()
}

pub fn configure_ntex_app(service_config: &mut web::ServiceConfig, config: &FieldGuardConfig) {
    service_config
        .route(&config.http.graphql_endpoint, web::post().to(graphql_endpoint_handler))
        .route("/health", web::to(health_check_handler));
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        ast::schema::SchemaAst,
        pipeline::request::{AccessNotice, DeniedQuery},
    };

    fn state() -> Arc<GuardSharedState> {
        let schema = SchemaAst::parse(
            r#"
            directive @authenticated on FIELD_DEFINITION
            type Query { products: [Product] }
            type Product { id: ID, name: String @authenticated }
            "#,
        )
        .unwrap();
        let mut config = FieldGuardConfig::default();
        config.access.nullify_unauthorized_fields = true;

        GuardSharedState::new(Arc::new(schema), config).unwrap()
    }

    #[tokio::test]
    async fn dry_run_reports_the_guarded_query() {
        let state = state();
        let mut req = GuardRequest::default()
            .with_params("params", GraphQLParams::new("{ products { id name } }"));
        let mut res = GuardResponse::new();

        state.guard.handle(&mut req, &mut res, &mut DryRunNext).await;

        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(
            res.body_json(),
            Some(json!({
                "graphql": {
                    "query": "{products{id}}",
                    "warnings": [{
                        "message": "Some requested fields were removed because the caller is not allowed to see them.",
                        "path": ["products.name"]
                    }]
                },
                "nullifiedPaths": [{ "property": "products.name" }]
            }))
        );
    }

    #[tokio::test]
    async fn dry_run_keeps_terminal_responses() {
        let mut req = GuardRequest::default();
        let mut res = GuardResponse::new();
        write_error_response(&mut res, &PipelineError::AccessDenied);

        DryRunNext.call(&mut req, &mut res).await;

        assert_eq!(res.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn request_without_query_is_a_client_error() {
        let state = state();
        let mut req = GuardRequest::default().with_params("params", GraphQLParams::default());
        let mut res = GuardResponse::new();

        let outcome = state.guard.handle(&mut req, &mut res, &mut DryRunNext).await;

        assert_eq!(outcome, crate::GuardOutcome::PassThrough);
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            res.body_json(),
            Some(json!({
                "errors": [{ "message": "Request does not contain a GraphQL operation" }]
            }))
        );
    }

    #[test]
    fn report_serializes_denials() {
        let context = GraphQLRequestContext::Denied(DeniedQuery {
            query: "query{}".to_string(),
            errors: vec![AccessNotice::new("Access denied.", &[FieldPath::new("me")])],
        });
        let report = DryRunReport {
            graphql: &context,
            nullified_paths: None,
        };

        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "graphql": {
                    "query": "query{}",
                    "errors": [{ "message": "Access denied.", "path": ["me"] }]
                }
            })
        );
    }
}
