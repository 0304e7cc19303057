use std::path::Path;

use ::config as config_rs;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

/// Settings tree read from `APP_*` variables.
///
/// Nested keys use `__`, so `APP_AUTH__ACCESS_TOKEN_TTL` lands in `auth.access_token_ttl`.
pub trait EnvConfig: Sized + DeserializeOwned {
    const PREFIX: &'static str = "APP";

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Process environment, after merging `.env`.
    fn from_env() -> Result<Self> {
        load_dotenv();
        Self::from_source(environment(Self::PREFIX))
    }

    /// Reads `vars` in place of the process environment.
    fn from_vars<'a>(vars: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let vars: config_rs::Map<String, String> = vars
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Self::from_source(environment(Self::PREFIX).source(Some(vars)))
    }

    fn from_source(source: config_rs::Environment) -> Result<Self> {
        let cfg = config_rs::Config::builder()
            .add_source(source)
            .build()
            .context("failed to collect config variables")?
            .try_deserialize::<Self>()
            .context("failed to deserialize config variables")?;
        cfg.validate()?;
        Ok(cfg)
    }
}

fn environment(prefix: &str) -> config_rs::Environment {
    config_rs::Environment::with_prefix(prefix)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn load_dotenv() {
    // crate root first, then the working directory
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    if dotenvy::from_filename(manifest_dir.join(".env")).is_err() {
        let _ = dotenvy::dotenv();
    }
}
