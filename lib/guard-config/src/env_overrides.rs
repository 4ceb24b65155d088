use config::{builder::BuilderState, ConfigBuilder, ConfigError};
use envconfig::Envconfig;
use tracing::debug;

use crate::log::{LogFormat, LogLevel};

#[derive(Envconfig)]
pub struct EnvVarOverrides {
    // Logger overrides
    #[envconfig(from = "LOG_LEVEL")]
    pub log_level: Option<LogLevel>,
    #[envconfig(from = "LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
    #[envconfig(from = "LOG_FILTER")]
    pub log_filter: Option<String>,

    // HTTP overrides
    #[envconfig(from = "PORT")]
    pub http_port: Option<u64>,
    #[envconfig(from = "HOST")]
    pub http_host: Option<String>,

    #[envconfig(from = "SCHEMA_FILE_PATH")]
    pub schema_file_path: Option<String>,

    // Access policy overrides
    #[envconfig(from = "PARTIAL_ACCESS")]
    pub partial_access: Option<bool>,
    #[envconfig(from = "NULLIFY_UNAUTHORIZED_FIELDS")]
    pub nullify_unauthorized_fields: Option<bool>,
    #[envconfig(from = "PARAMS_SLOT")]
    pub params_slot: Option<String>,

    #[envconfig(from = "JWT_SECRET")]
    pub jwt_secret: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum EnvVarOverridesError {
    #[error("Failed to override configuration: {0}")]
    FailedToOverrideConfig(#[from] ConfigError),
}

impl EnvVarOverrides {
    pub fn apply_overrides<T: BuilderState>(
        mut self,
        mut config: ConfigBuilder<T>,
    ) -> Result<ConfigBuilder<T>, EnvVarOverridesError> {
        if let Some(log_level) = self.log_level.take() {
            debug!("[config-override] 'log.level' = {:?}", log_level);
            config = config.set_override("log.level", log_level.as_str())?;
        }
        if let Some(log_format) = self.log_format.take() {
            debug!("[config-override] 'log.format' = {:?}", log_format);
            config = config.set_override("log.format", log_format.as_str())?;
        }
        if let Some(log_filter) = self.log_filter.take() {
            debug!("[config-override] 'log.filter' = {:?}", log_filter);
            config = config.set_override("log.filter", log_filter)?;
        }

        if let Some(http_port) = self.http_port.take() {
            debug!("[config-override] 'http.port' = {}", http_port);
            config = config.set_override("http.port", http_port)?;
        }
        if let Some(http_host) = self.http_host.take() {
            debug!("[config-override] 'http.host' = {}", http_host);
            config = config.set_override("http.host", http_host)?;
        }

        if let Some(schema_file_path) = self.schema_file_path.take() {
            debug!("[config-override] 'schema.path' = {}", schema_file_path);
            config = config.set_override("schema.source", "file")?;
            config = config.set_override("schema.path", schema_file_path)?;
        }

        if let Some(partial_access) = self.partial_access.take() {
            debug!("[config-override] 'access.partial_access' = {}", partial_access);
            config = config.set_override("access.partial_access", partial_access)?;
        }
        if let Some(nullify) = self.nullify_unauthorized_fields.take() {
            debug!(
                "[config-override] 'access.nullify_unauthorized_fields' = {}",
                nullify
            );
            config = config.set_override("access.nullify_unauthorized_fields", nullify)?;
        }
        if let Some(params_slot) = self.params_slot.take() {
            debug!("[config-override] 'access.params_slot' = {}", params_slot);
            config = config.set_override("access.params_slot", params_slot)?;
        }

        if let Some(jwt_secret) = self.jwt_secret.take() {
            debug!("[config-override] 'jwt.secret' = <redacted>");
            config = config.set_override("jwt.secret", jwt_secret)?;
        }

        Ok(config)
    }
}
