//! Layered settings: defaults, then `vault.toml`, then `VAULT__*` environment variables.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat, Source};
use serde::Deserialize;
use store::VaultConfig;

/// Hosted project endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Supabase {
    /// Project base URL, e.g. `https://xyzcompany.supabase.co`.
    pub url: String,
    /// Public anon key, sent as `apikey` on every request.
    pub anon_key: String,
}

impl Supabase {
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.url.trim_end_matches('/'))
    }

    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Http {
    pub timeout_secs: u64,
}

impl Http {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub supabase: Supabase,
    pub http: Http,
    #[serde(default)]
    pub vault: VaultConfig,
}

impl Settings {
    /// Load `vault.toml` from the working directory (optional) and the environment.
    pub fn new() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::build(
            File::with_name(VaultConfig::filename())
                .format(FileFormat::Toml)
                .required(false),
        )
    }

    fn build<T>(file: T) -> Result<Self, ConfigError>
    where
        T: Source + Send + Sync + 'static,
    {
        let config = Config::builder()
            .set_default("supabase.url", "http://localhost:54321")?
            .set_default("supabase.anon_key", "")?
            .set_default("http.timeout_secs", 30_i64)?
            .add_source(file)
            .add_source(Environment::with_prefix("VAULT").separator("__"))
            .build()?;

        let settings: Self = config.try_deserialize()?;
        if settings.supabase.url.trim().is_empty() {
            return Err(ConfigError::Message("supabase.url must not be empty".into()));
        }
        Ok(settings)
    }
}
