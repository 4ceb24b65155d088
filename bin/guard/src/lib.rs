pub mod ast;
pub mod jwt;
mod logger;
pub mod pipeline;
mod server;
mod shared_state;

use std::sync::Arc;

use field_guard_config::load_config;
use ntex::web;
use tracing::info;

use crate::{ast::schema::SchemaAst, logger::configure_logging, server::configure_ntex_app};

pub use crate::{
    pipeline::{FieldGuard, FieldGuardBuilder, GuardOutcome, Next},
    server::DryRunReport,
    shared_state::{GuardSharedState, SharedStateError},
};

pub async fn guard_entrypoint() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var("FIELD_GUARD_CONFIG_FILE_PATH").ok();
    let config = load_config(config_path)?;
    configure_logging(&config.log);
    info!("field-guard@{} starting...", env!("CARGO_PKG_VERSION"));

    let sdl = config.schema.load()?;
    let schema = Arc::new(SchemaAst::parse(&sdl)?);
    let addr = config.http.address();
    let shared_state = GuardSharedState::new(schema, config)?;

    info!(
        address = addr.as_str(),
        endpoint = shared_state.config.http.graphql_endpoint.as_str(),
        "dry-run server listening"
    );

    web::HttpServer::new(async move || {
        web::App::new()
            .state(shared_state.clone())
            .configure(|service_config| {
                configure_ntex_app(service_config, &shared_state.config);
            })
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}
