use super::types::*;
use super::{expand_env_vars, expand_tilde, unexpanded_env_vars};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    let config = parse_config_str(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })?;

    validate_config(&config)?;
    Ok(config)
}

/// Parse config YAML after expanding `$env{...}` references. Does not validate.
pub fn parse_config_str(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    let mut config: Config = serde_yaml::from_str(&yaml_string)?;

    if let Some(dir) = config.output.write_dir.as_mut() {
        *dir = expand_tilde(dir);
    }

    Ok(config)
}

fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    // References inside YAML comments are never read
    let live: String = yaml_string
        .lines()
        .map(strip_comment)
        .collect::<Vec<_>>()
        .join("\n");
    let unexpanded = unexpanded_env_vars(&live);
    if unexpanded.is_empty() {
        return Ok(());
    }

    let error_msg = if unexpanded.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with the actual value",
            unexpanded[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             Set them before running, or replace the references in the config file",
            unexpanded.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

/// Drop a YAML comment from one line. A `#` starts a comment at the start of
/// the line or after whitespace, outside quoted scalars.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut prev_is_space = true;
    for (i, c) in line.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if (c == '\'' || c == '"') && prev_is_space => quote = Some(c),
            None if c == '#' && prev_is_space => return &line[..i],
            None => {}
        }
        prev_is_space = c.is_whitespace();
    }
    line
}

/// Check value ranges and URL shapes. Empty URLs are allowed here because the
/// command line may still supply them.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_url("backend.poll_url", &config.backend.poll_url, &mut errors);
    validate_url("backend.subscribe_url", &config.backend.subscribe_url, &mut errors);

    if config.backend.request_timeout.is_zero() {
        errors.push("backend.request_timeout must be greater than zero".to_string());
    }

    let polling = &config.polling;
    for (name, value) in [
        ("polling.interval", polling.interval),
        ("polling.error_retry_interval", polling.error_retry_interval),
        ("polling.throttle_retry_interval", polling.throttle_retry_interval),
    ] {
        if value.is_zero() {
            errors.push(format!("{} must be greater than zero", name));
        }
    }

    if polling.max_auth_attempts == 0 {
        errors.push("polling.max_auth_attempts must be at least 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_url(field: &str, url: &str, errors: &mut Vec<String>) {
    if url.is_empty() {
        return;
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(format!("{}: '{}' must be an http(s) URL", field, url));
    }
}
