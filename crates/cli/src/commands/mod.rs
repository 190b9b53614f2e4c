pub mod brands;
pub mod run;
pub mod templates;
pub mod usage;

use brandforge_config::AppConfig;
use std::path::Path;

/// Load the config file given on the command line, or the default one.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env(|key| std::env::var(key).ok());
            config.validate()?;
            config
        }
        None => AppConfig::load()?,
    };
    Ok(config)
}
