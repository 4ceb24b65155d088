pub mod env_overrides;
pub mod http_server;
pub mod jwt_auth;
pub mod log;
pub mod policy;
pub mod schema;

use config::{Config, File, FileFormat, FileSourceFile};
use envconfig::Envconfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{
    env_overrides::{EnvVarOverrides, EnvVarOverridesError},
    http_server::HttpServerConfig,
    jwt_auth::JwtAuthConfig,
    log::LoggingConfig,
    policy::AccessPolicyConfig,
    schema::SchemaSource,
};

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FieldGuardConfig {
    /// Logger configuration.
    #[serde(default)]
    pub log: LoggingConfig,

    /// Listener of the dry-run HTTP server.
    #[serde(default)]
    pub http: HttpServerConfig,

    /// Where the annotated schema SDL is read from.
    #[serde(default)]
    pub schema: SchemaSource,

    /// Field access policy applied to every GraphQL request.
    #[serde(default)]
    pub access: AccessPolicyConfig,

    /// Bearer token verification used by the bundled authenticator.
    #[serde(default)]
    pub jwt: JwtAuthConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum GuardConfigError {
    #[error("Failed to load configuration: {0}")]
    ConfigLoadError(#[from] config::ConfigError),
    #[error("Failed to apply configuration overrides: {0}")]
    EnvVarOverridesError(#[from] EnvVarOverridesError),
    #[error("Failed to load the environment variables: {0}")]
    EnvVarLoadError(#[from] envconfig::Error),
    #[error("Failed to get the current directory: {0}")]
    CurrentDirError(std::io::Error),
}

static DEFAULT_FILE_NAMES: &[&str] = &[
    "field-guard.config.yaml",
    "field-guard.config.yml",
    "field-guard.config.json",
    "field-guard.config.json5",
];

fn get_current_dir() -> Result<PathBuf, GuardConfigError> {
    std::env::current_dir().map_err(GuardConfigError::CurrentDirError)
}

/// Loads the configuration from `config_path` (or one of the default file names in the
/// working directory), then applies the environment variable overrides.
pub fn load_config(config_path: Option<String>) -> Result<FieldGuardConfig, GuardConfigError> {
    let env_overrides = EnvVarOverrides::init_from_env()?;
    let mut config = Config::builder();
    let mut config_root_path = get_current_dir()?;

    if let Some(path_str) = config_path {
        let path_buf = PathBuf::from(path_str);
        if let Some(parent_dir) = path_buf.parent() {
            config_root_path = config_root_path.join(parent_dir);
        }
        let as_file: File<FileSourceFile, _> = path_buf.into();
        config = config.add_source(as_file.required(true));
    } else {
        for name in DEFAULT_FILE_NAMES {
            config = config.add_source(File::with_name(name).required(false));
        }
    }

    config = env_overrides.apply_overrides(config)?;

    let mut guard_config = config.build()?.try_deserialize::<FieldGuardConfig>()?;
    guard_config.resolve_paths(&config_root_path);

    Ok(guard_config)
}

pub fn parse_yaml_config(config_raw: &str) -> Result<FieldGuardConfig, GuardConfigError> {
    let config_root_path = get_current_dir()?;
    let mut guard_config = Config::builder()
        .add_source(File::from_str(config_raw, FileFormat::Yaml))
        .build()?
        .try_deserialize::<FieldGuardConfig>()?;
    guard_config.resolve_paths(&config_root_path);

    Ok(guard_config)
}

impl FieldGuardConfig {
    fn resolve_paths(&mut self, root: &Path) {
        self.schema.resolve_against(root);
    }
}
