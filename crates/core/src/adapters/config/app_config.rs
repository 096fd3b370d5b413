use config::{Config, Environment, File, Map};
use error_stack::{report, Report, ResultExt};
use serde_path_to_error::Segment;
use thiserror::Error;

pub const DEFAULT_SPREADSHEET_NAME: &str = "example-spreadsheet";
pub const DEFAULT_CONFIG_PATH: &str = "Gradebook";

#[derive(serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub spreadsheet_name: String,
    pub share_to_email: Option<String>,
    /// Service-account key file downloaded from the cloud console.
    pub credentials_path: String,
    pub total_classes: u32,
    pub log_file: String,
    pub log_level: String,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration sources")]
    Load,
    #[error("failed to deserialize configuration at '{path}'")]
    Deserialize { path: String },
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

impl AppConfig {
    /// Loads defaults, then the optional file named by `CONFIG_PATH`, then the process environment.
    pub fn load() -> error_stack::Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&config_path, None)
    }

    /// `env` replaces the process environment when given.
    pub fn load_from(
        config_path: &str,
        env: Option<Map<String, String>>,
    ) -> error_stack::Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("spreadsheet_name", DEFAULT_SPREADSHEET_NAME)
            .and_then(|b| b.set_default("credentials_path", "credentials.json"))
            .and_then(|b| b.set_default("total_classes", 10))
            .and_then(|b| b.set_default("log_file", "gradebook.log"))
            .and_then(|b| b.set_default("log_level", "info"))
            .change_context(ConfigError::Load)?
            .add_source(File::with_name(config_path).required(false))
            .add_source(Environment::default().ignore_empty(true).source(env))
            .build()
            .change_context(ConfigError::Load)
            .attach_printable_lazy(|| format!("config file: {}", config_path))?;

        let app_config: AppConfig = serde_path_to_error::deserialize(config).map_err(|e| {
            let path = e
                .path()
                .iter()
                .map(|seg| match seg {
                    Segment::Seq { index } => format!("[{}]", index),
                    Segment::Map { key } => format!(".{}", key),
                    Segment::Enum { variant } => format!("::{}", variant),
                    Segment::Unknown => String::from("<?>"),
                })
                .collect::<String>();
            let message = e.inner().to_string();
            Report::new(ConfigError::Deserialize {
                path: path.trim_start_matches('.').to_string(),
            })
            .attach_printable(message)
        })?;

        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> error_stack::Result<(), ConfigError> {
        if self.spreadsheet_name.trim().is_empty() {
            return Err(report!(ConfigError::Invalid("spreadsheet_name is blank")));
        }
        if self.total_classes == 0 {
            return Err(report!(ConfigError::Invalid(
                "total_classes must be greater than zero"
            )));
        }
        if let Some(email) = &self.share_to_email {
            if !email.contains('@') {
                return Err(report!(ConfigError::Invalid(
                    "share_to_email is not an email address"
                )))
                .attach_printable_lazy(|| format!("share_to_email = {}", email));
            }
        }
        Ok(())
    }
}
