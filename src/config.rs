use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use quadld::Defaults;

#[derive(Clone, Default, Debug, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    pub(crate) store: StoreConfig,
    pub(crate) jsonld: Defaults,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub(crate) struct StoreConfig {
    pub(crate) path: PathBuf,
    /// Remove the store when the process exits.
    pub(crate) temporary: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("quadld.db"),
            temporary: false,
        }
    }
}

impl Config {
    pub(crate) fn load(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_use_defaults() -> Result<()> {
        let config: Config = toml::from_str(
            r#"
            [jsonld]
            base = "http://example.org/"
            overwrite = true
            "#,
        )?;
        assert_eq!(config.store.path, PathBuf::from("quadld.db"));
        assert_eq!(config.jsonld.base, "http://example.org/");
        assert!(config.jsonld.overwrite);
        assert!(config.jsonld.sync);
        Ok(())
    }
}
