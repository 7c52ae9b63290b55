use anyhow::Context;
use edgeguard_core::Config;
use std::path::Path;

/// Load the TOML file (if any), overlay the environment and validate.
pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("reading configuration from {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env_overrides();
    config.validate().context("invalid configuration")?;
    Ok(config)
}
