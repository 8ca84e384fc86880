use anyhow::{Context, Result};

use crate::config::{BloxConfig, ConfigLayout};

/// Load the config JSON for `layout`, falling back to defaults when absent.
pub fn load_config(layout: &ConfigLayout) -> Result<BloxConfig> {
    if !layout.config_path.exists() {
        return Ok(BloxConfig::default());
    }
    let config_json = std::fs::read_to_string(&layout.config_path).with_context(|| {
        format!("Failed to read config at {}", layout.config_path.display())
    })?;
    let config: BloxConfig =
        serde_json::from_str(&config_json).context("Failed to parse config JSON")?;
    Ok(config)
}

/// Write `config` as pretty JSON, creating the meta directory when needed.
pub fn save_config(layout: &ConfigLayout, config: &BloxConfig) -> Result<()> {
    std::fs::create_dir_all(&layout.meta_dir).with_context(|| {
        format!("Failed to create config dir: {}", layout.meta_dir.display())
    })?;
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&layout.config_path, json)
        .with_context(|| format!("Failed to write config: {}", layout.config_path.display()))?;
    Ok(())
}
