use serde::Deserialize;
use thiserror::Error as ThisError;

/// Environment variable selecting the runtime environment.
pub const ENV_VAR: &str = "QUARRY_ENV";

/// Environment value that enables hardened mode.
pub const PRODUCTION: &str = "production";

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("invalid forge configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

///
/// ForgeConfig
///
/// Environment-level toggles for the forge.
/// `hardened` enables the populate-safety diagnostics.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ForgeConfig {
    pub hardened: bool,
}

impl ForgeConfig {
    #[must_use]
    pub const fn hardened() -> Self {
        Self { hardened: true }
    }

    /// Read the configuration from `QUARRY_ENV`.
    #[must_use]
    pub fn from_env() -> Self {
        let env = std::env::var(ENV_VAR).ok();

        Self::from_env_value(env.as_deref())
    }

    pub(crate) fn from_env_value(value: Option<&str>) -> Self {
        Self {
            hardened: value.is_some_and(|v| v.trim() == PRODUCTION),
        }
    }

    /// Parse the `[forge]` table of a TOML document.
    /// A document without that table yields the default configuration.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        struct Document {
            #[serde(default)]
            forge: ForgeConfig,
        }

        let document: Document = toml::from_str(source)?;

        Ok(document.forge)
    }
}
