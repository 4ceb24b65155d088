use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(tag = "source")]
pub enum SchemaSource {
    /// Reads the annotated schema SDL from the filesystem.
    /// Relative paths are resolved against the directory of the configuration file.
    #[serde(rename = "file")]
    File { path: PathBuf },
}

impl Default for SchemaSource {
    fn default() -> Self {
        SchemaSource::File {
            path: "schema.graphql".into(),
        }
    }
}

impl SchemaSource {
    pub(crate) fn resolve_against(&mut self, root: &std::path::Path) {
        match self {
            SchemaSource::File { path } if path.is_relative() => {
                *path = root.join(&*path);
            }
            SchemaSource::File { .. } => {}
        }
    }

    pub fn load(&self) -> Result<String, std::io::Error> {
        match self {
            SchemaSource::File { path } => std::fs::read_to_string(path).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!("Failed to read schema file '{}': {}", path.display(), e),
                )
            }),
        }
    }
}
