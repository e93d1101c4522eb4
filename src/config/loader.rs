//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::TransferConfig;
use crate::config::secret_string;
use crate::domain::errors::TransferError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into TransferConfig
/// 4. Applies environment variable overrides (SHEETBRIDGE_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`TransferError::Configuration`] if the file cannot be read,
/// a referenced variable is unset, parsing fails or validation fails.
///
/// # Examples
///
/// ```no_run
/// use sheetbridge::config::loader::load_config;
///
/// let config = load_config("sheetbridge.toml").expect("Failed to load config");
/// println!("table: {}", config.database.table);
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<TransferConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(TransferError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        TransferError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_str(&contents)
}

/// Loads configuration from TOML text
///
/// Same pipeline as [`load_config`] minus the file read.
pub fn load_config_str(contents: &str) -> Result<TransferConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: TransferConfig = toml::from_str(&contents)
        .map_err(|e| TransferError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        TransferError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| TransferError::Other(format!("invalid substitution pattern: {e}")))?;
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    for line in input.lines() {
        // Placeholders inside comments are left alone
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(TransferError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn parse_override<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| TransferError::Configuration(format!("Invalid value for {name}: {e}")))
}

/// Applies environment variable overrides using SHEETBRIDGE_* prefix
///
/// Environment variables follow the pattern: SHEETBRIDGE_<SECTION>_<KEY>
/// For example: SHEETBRIDGE_EXPORT_PAGE_SIZE, SHEETBRIDGE_IMPORT_COMMIT_STRATEGY
fn apply_env_overrides(config: &mut TransferConfig) -> Result<()> {
    let var = |name: &str| std::env::var(name).ok();

    // Application
    if let Some(val) = var("SHEETBRIDGE_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = var("SHEETBRIDGE_APPLICATION_DRY_RUN") {
        config.application.dry_run = parse_override("SHEETBRIDGE_APPLICATION_DRY_RUN", &val)?;
    }

    // Database
    if let Some(val) = var("SHEETBRIDGE_DATABASE_CONNECTION_STRING") {
        config.database.connection_string = secret_string(val);
    }
    if let Some(val) = var("SHEETBRIDGE_DATABASE_TABLE") {
        config.database.table = parse_override("SHEETBRIDGE_DATABASE_TABLE", &val)?;
    }
    if let Some(val) = var("SHEETBRIDGE_DATABASE_KEY_COLUMN") {
        config.database.key_column = parse_override("SHEETBRIDGE_DATABASE_KEY_COLUMN", &val)?;
    }
    if let Some(val) = var("SHEETBRIDGE_DATABASE_MAX_CONNECTIONS") {
        config.database.max_connections =
            parse_override("SHEETBRIDGE_DATABASE_MAX_CONNECTIONS", &val)?;
    }

    // Export
    if let Some(val) = var("SHEETBRIDGE_EXPORT_PAGE_SIZE") {
        config.export.page_size = parse_override("SHEETBRIDGE_EXPORT_PAGE_SIZE", &val)?;
    }
    if let Some(val) = var("SHEETBRIDGE_EXPORT_CONCURRENCY") {
        config.export.concurrency = parse_override("SHEETBRIDGE_EXPORT_CONCURRENCY", &val)?;
    }
    if let Some(val) = var("SHEETBRIDGE_EXPORT_PAGINATION") {
        config.export.pagination = parse_override("SHEETBRIDGE_EXPORT_PAGINATION", &val)?;
    }
    if let Some(val) = var("SHEETBRIDGE_EXPORT_SHEET_NAME_PREFIX") {
        config.export.sheet_name_prefix = val;
    }

    // Import
    if let Some(val) = var("SHEETBRIDGE_IMPORT_BATCH_SIZE") {
        config.import.batch_size = parse_override("SHEETBRIDGE_IMPORT_BATCH_SIZE", &val)?;
    }
    if let Some(val) = var("SHEETBRIDGE_IMPORT_PARTITION_COUNT") {
        config.import.partition_count =
            parse_override("SHEETBRIDGE_IMPORT_PARTITION_COUNT", &val)?;
    }
    if let Some(val) = var("SHEETBRIDGE_IMPORT_COMMIT_STRATEGY") {
        config.import.commit_strategy =
            parse_override("SHEETBRIDGE_IMPORT_COMMIT_STRATEGY", &val)?;
    }
    if let Some(val) = var("SHEETBRIDGE_IMPORT_STOP_ON_ABORT") {
        config.import.stop_on_abort = parse_override("SHEETBRIDGE_IMPORT_STOP_ON_ABORT", &val)?;
    }

    // Logging
    if let Some(val) = var("SHEETBRIDGE_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled =
            parse_override("SHEETBRIDGE_LOGGING_LOCAL_ENABLED", &val)?;
    }
    if let Some(val) = var("SHEETBRIDGE_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
