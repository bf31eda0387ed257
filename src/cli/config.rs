use crate::config::generate::generate_starter_config;
use crate::config::{load_config, user_config_path};
use std::fs;
use std::path::{Path, PathBuf};

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_content = generate_starter_config();

    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    let config_path = user_config_path().unwrap_or_else(|| PathBuf::from("/etc/applogs/config.yml"));
    let written = write_config(&config_content, &config_path)?;
    println!("Config file written to {}", written.display());
    Ok(())
}

/// Write `content` to `path`, refusing to replace an existing file.
pub fn write_config(content: &str, path: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if path.exists() {
        return Err(format!(
            "config file already exists at {}; remove it first or use --stdout",
            path.display()
        )
        .into());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(path.to_path_buf())
}

pub fn validate(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path.ok_or("No config file found. Use --config to specify a path.")?;

    println!("Validating config file: {}", path.display());
    load_config(&path)?;
    println!("✓ Config is valid");
    Ok(())
}
