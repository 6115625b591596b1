mod combo;
mod key;

#[cfg(test)]
mod tests;

pub use combo::ComboDef;
pub use key::parse_key;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "Vec::new")]
    pub combos: Vec<ComboDef>,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Config> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let yaml = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Config::from_yaml(&yaml).with_context(|| format!("failed to parse {}", path.display()))
}
