use crate::config::EngineConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the engine configuration by layering an optional TOML file and
    /// `WB_`-prefixed environment variables over the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or parsed.
    pub fn load(path: Option<&str>) -> Result<EngineConfig> {
        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        let config: EngineConfig = figment.merge(Env::prefixed("WB_").split("__")).extract()?;

        Ok(config)
    }
}
