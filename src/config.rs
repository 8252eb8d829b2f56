use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, ServiceError};

/// Engines in the pool when no count is configured.
pub const DEFAULT_ENGINE_POOL_SIZE: usize = 1;

/// Service configuration, read once at startup.
#[derive(Deserialize, Debug, Clone)]
pub struct ServiceConfig {
    /// Path to the engine definition artifact the first engine is built from.
    pub app_path: String,

    /// Number of engine instances kept in the pool. Defaults to 1.
    pub engine_pool_size: Option<usize>,

    /// Static annotation-set filter specification, e.g. "*:Drug,sections:*".
    /// Absent means no restriction.
    pub annotation_sets: Option<String>,
}

impl ServiceConfig {
    pub fn pool_size(&self) -> usize {
        self.engine_pool_size.unwrap_or(DEFAULT_ENGINE_POOL_SIZE)
    }

    pub fn validate(&self) -> Result<()> {
        if self.app_path.trim().is_empty() {
            return Err(ServiceError::ConfigValidationError(
                "ServiceConfig: app_path must not be empty".to_string(),
            ));
        }
        if let Some(size) = self.engine_pool_size {
            if size == 0 {
                return Err(ServiceError::ConfigValidationError(
                    "ServiceConfig: engine_pool_size must be greater than 0".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Loads and parses the service configuration YAML file.
pub fn load_service_config<P: AsRef<Path>>(config_path: P) -> Result<ServiceConfig> {
    let path_ref = config_path.as_ref();
    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        ServiceError::ConfigError(format!(
            "Failed to read service config file '{}': {}",
            path_ref.display(),
            e
        ))
    })?;

    let config: ServiceConfig = serde_yaml::from_str(&config_content).map_err(|e| {
        ServiceError::ConfigError(format!(
            "Failed to parse service config YAML from '{}': {}",
            path_ref.display(),
            e
        ))
    })?;

    config.validate()?;

    Ok(config)
}
