use super::{constants::session::DEFAULT_SALT_PREFIX, info, warn, FiresiteError, FiresiteResult};
use serde::{Deserialize, Serialize};
use std::{env::VarError, fmt, str::FromStr};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Dev,
    Prod,
}

impl FromStr for Environment {
    type Err = FiresiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dev" | "development" => Ok(Self::Dev),
            "prod" | "production" => Ok(Self::Prod),
            other => Err(FiresiteError::Config(format!("unknown environment `{other}`"))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dev => "dev",
            Self::Prod => "prod",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiresiteConfig {
    pub env: Environment,
    pub dev_func_url: Option<String>,
    pub prod_func_url: Option<String>,
    pub password_salt_prefix: String,
}

impl Default for FiresiteConfig {
    fn default() -> Self {
        Self {
            env: Environment::Dev,
            dev_func_url: None,
            prod_func_url: None,
            password_salt_prefix: DEFAULT_SALT_PREFIX.into(),
        }
    }
}

impl FiresiteConfig {
    /// Reads `FIRESITE_*` variables from the process environment and `.env`.
    pub fn from_env() -> FiresiteResult<Self> {
        Self::from_lookup(|key| match dotenvy::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(dotenvy::Error::EnvVar(VarError::NotPresent)) => Ok(None),
            Err(e) => Err(e.into()),
        })
    }

    pub fn from_lookup<F>(mut lookup: F) -> FiresiteResult<Self>
    where
        F: FnMut(&str) -> FiresiteResult<Option<String>>,
    {
        let mut config = Self::default();
        if let Some(env) = lookup("FIRESITE_ENV")? {
            config.env = env.parse()?;
        }
        config.dev_func_url = lookup("FIRESITE_DEV_FUNC_URL")?.filter(|url| !url.is_empty());
        config.prod_func_url = lookup("FIRESITE_PROD_FUNC_URL")?.filter(|url| !url.is_empty());
        if let Some(prefix) = lookup("FIRESITE_SALT_PREFIX")? {
            config.password_salt_prefix = prefix;
        }

        if config.env == Environment::Dev && lookup("FIRESITE_FORCE_PROD")?.is_some_and(|v| v == "1") {
            warn!("using production resources from a dev environment");
            config.env = Environment::Prod;
        }
        info!("firesite environment: {}", config.env);

        Ok(config)
    }

    pub fn in_dev(&self) -> bool {
        self.env == Environment::Dev
    }

    pub fn in_prod(&self) -> bool {
        self.env == Environment::Prod
    }

    /// Cloud function endpoint of the current environment.
    pub fn api_url(&self) -> Option<&str> {
        let url = match self.env {
            Environment::Dev => self.dev_func_url.as_deref(),
            Environment::Prod => self.prod_func_url.as_deref(),
        };
        if url.is_none() {
            warn!("no cloud function url configured for {}", self.env);
        }
        url
    }
}
