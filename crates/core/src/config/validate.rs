use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0 and the upload limit is positive
/// - Upload and output areas are set and distinct
/// - Engine program is set and its timeout is positive
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.server.max_upload_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "server.max_upload_bytes cannot be 0".to_string(),
        ));
    }

    let storage = &config.storage;
    if storage.upload_dir.as_os_str().is_empty() || storage.output_dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "storage.upload_dir and storage.output_dir must be set".to_string(),
        ));
    }
    if storage.upload_dir == storage.output_dir {
        return Err(ConfigError::ValidationError(
            "storage.upload_dir and storage.output_dir must differ".to_string(),
        ));
    }

    if config.engine.program.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "engine.program cannot be empty".to_string(),
        ));
    }
    if config.engine.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "engine.timeout_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}
