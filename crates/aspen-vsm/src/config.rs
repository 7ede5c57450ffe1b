//! Runtime configuration for value-stream map rendering.

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use snafu::ResultExt;
use snafu::ensure;
use tracing::debug;
use tracing::instrument;

use crate::error::ConfigTooLargeSnafu;
use crate::error::InvalidConfigSnafu;
use crate::error::ParseConfigSnafu;
use crate::error::Result;

// Tiger Style: Bounded resource limits
/// Maximum accepted config document size (1 MB).
const MAX_CONFIG_SIZE: usize = 1024 * 1024;

/// Message attached to pipelines that no longer exist in configuration.
pub const DEFAULT_DELETED_PIPELINE_MESSAGE: &str = "Pipeline has been deleted.";

/// Options controlling how value-stream maps are built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValueStreamMapConfig {
    /// Add configured downstream consumers to pipeline maps.
    #[serde(default = "default_true")]
    pub include_downstream: bool,

    /// Mark the root when its materials were reached at different revisions.
    #[serde(default = "default_true")]
    pub warn_on_incompatible_revisions: bool,

    /// Message shown on pipelines missing from configuration.
    #[serde(default = "default_deleted_pipeline_message")]
    pub deleted_pipeline_message: String,
}

fn default_true() -> bool {
    true
}

fn default_deleted_pipeline_message() -> String {
    DEFAULT_DELETED_PIPELINE_MESSAGE.to_string()
}

impl Default for ValueStreamMapConfig {
    fn default() -> Self {
        Self {
            include_downstream: true,
            warn_on_incompatible_revisions: true,
            deleted_pipeline_message: default_deleted_pipeline_message(),
        }
    }
}

impl ValueStreamMapConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.deleted_pipeline_message.trim().is_empty(), InvalidConfigSnafu {
            reason: "deleted_pipeline_message cannot be empty",
        });
        Ok(())
    }

    /// Parse and validate a JSON configuration document.
    ///
    /// # Errors
    ///
    /// - `ConfigTooLarge` if the document exceeds 1 MB
    /// - `ParseConfig` if it is not valid JSON for this type
    /// - `InvalidConfig` if validation fails
    #[instrument(skip(content), fields(size = content.len()))]
    pub fn from_json_str(content: &str) -> Result<Self> {
        ensure!(content.len() <= MAX_CONFIG_SIZE, ConfigTooLargeSnafu {
            size: content.len(),
            max: MAX_CONFIG_SIZE,
        });

        let config: Self = serde_json::from_str(content).context(ParseConfigSnafu)?;
        config.validate()?;
        debug!(?config, "loaded value stream map config");
        Ok(config)
    }
}
