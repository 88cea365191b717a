#[macro_use]
extern crate tracing;

mod app_config;
mod args;

pub use app_config::{
    default_log_dir,
    get_config_dir,
    get_data_dir,
};
use app_config::PROJECT_NAME;
pub use args::Args;
use color_eyre::Result;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    net::SocketAddr,
    path::{
        Path,
        PathBuf,
    },
};
use url::Url;

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DailyConfig {
    /// Base URL of the room provisioning API, rooms are created at `<api_url>/rooms`.
    pub api_url: Url,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TlsConfig {
    pub certificate: PathBuf,
    pub private_key: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub listen_address: SocketAddr,
    pub server_name: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    pub daily: DailyConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
}

impl Default for Config {
    fn default() -> Self {
        serde_yml::from_str(DEFAULT_CONFIG).expect("Failed to parse default config")
    }
}

impl Config {
    /// Builds the configuration from, in increasing precedence, the built-in
    /// defaults, `config.yaml` in the config directory, the file passed with
    /// `--config`, `CALL_METRICS_*` environment variables and `args`.
    pub fn new(args: Args) -> Result<Self, config::ConfigError> {
        let config_dir = get_config_dir();
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml))
            .set_default("log_dir", default_log_dir().display().to_string())?;

        builder = builder.add_source(
            config::File::from(config_dir.join("config.yaml"))
                .format(config::FileFormat::Yaml)
                .required(false),
        );

        if let Some(path) = &args.config {
            builder = builder.add_source(config::File::from(path.as_path()).format(config::FileFormat::Yaml));
        }

        builder = builder
            .add_source(
                config::Environment::with_prefix(&PROJECT_NAME)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .add_source(args);

        let cfg: Self = builder.build()?.try_deserialize()?;
        debug!(listen_address = %cfg.listen_address, log_dir = ?cfg.log_dir, "configuration loaded");
        Ok(cfg)
    }

    /// Checks what deserialization cannot, such as referenced files existing.
    pub fn validate(&self) -> Result<()> {
        if self.server_name.trim().is_empty() {
            return Err(eyre::eyre!("server_name must not be empty"));
        }
        if let Some(tls) = &self.tls {
            for path in [&tls.certificate, &tls.private_key] {
                if !path.is_file() {
                    return Err(eyre::eyre!("TLS file {:?} does not exist", path));
                }
            }
        }
        if self.daily.api_key.is_none() {
            warn!("no room provisioning API key configured, creating meetings will fail");
        }
        Ok(())
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Link handed to participants to join the current meeting.
    pub fn invite_url(&self) -> String {
        format!("https://{}/videocall", self.server_name)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use temp_dir::TempDir;

    #[test]
    fn default_config_parses() {
        let config = Config::default();
        assert_eq!(config.listen_address, "127.0.0.1:5000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.daily.api_url.as_str(), "https://api.daily.co/v1/");
        assert_eq!(config.tls, None);
        assert_eq!(config.invite_url(), "https://localhost:5000/videocall");
    }

    #[test]
    fn args_override_files() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("extra.yaml");
        std::fs::write(&file, "server_name: calls.example.com\nlisten_address: \"0.0.0.0:7000\"\n").unwrap();

        let args = Args {
            listen_address: Some("127.0.0.1:9000".parse().unwrap()),
            log_dir: Some(dir.path().join("logs")),
            daily_api_key: Some("secret".to_string()),
            config: Some(file),
            ..Args::default()
        };
        let config = Config::new(args).unwrap();

        assert_eq!(config.listen_address, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.server_name, "calls.example.com");
        assert_eq!(config.log_dir(), dir.path().join("logs"));
        assert_eq!(config.daily.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn validate_rejects_missing_tls_files() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.tls = Some(TlsConfig {
            certificate: dir.path().join("cert.pem"),
            private_key: dir.path().join("key.pem"),
        });
        assert!(config.validate().is_err());

        std::fs::write(dir.path().join("cert.pem"), "cert").unwrap();
        std::fs::write(dir.path().join("key.pem"), "key").unwrap();
        assert!(config.validate().is_ok());
    }
}
