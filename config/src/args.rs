use clap::Parser;
use std::{
    net::SocketAddr,
    path::PathBuf,
};

/// Video call network metrics collector
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version = version(), about, long_about = None)]
pub struct Args {
    /// Address the HTTP server listens on.
    #[arg(long, env = "CALL_METRICS_LISTEN_ADDRESS", value_name = "ADDR")]
    pub listen_address: Option<SocketAddr>,

    /// Host (and port) used when building invite links.
    #[arg(long, value_name = "HOST")]
    pub server_name: Option<String>,

    /// Directory the call logs are written to.
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// API key used to create meeting rooms.
    #[arg(long, env = "CALL_METRICS_DAILY_API_KEY", hide_env_values = true)]
    pub daily_api_key: Option<String>,

    /// PEM certificate, enables HTTPS together with `--private-key`.
    #[arg(long, value_name = "FILE", requires = "private_key")]
    pub certificate: Option<PathBuf>,

    /// PEM private key for `--certificate`.
    #[arg(long, value_name = "FILE", requires = "certificate")]
    pub private_key: Option<PathBuf>,

    /// Additional configuration file, read after the one in the config directory.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(listen_address) = &self.listen_address {
                cache.insert("listen_address".to_string(), listen_address.to_string().into());
            }
            if let Some(server_name) = &self.server_name {
                cache.insert("server_name".to_string(), server_name.clone().into());
            }
            if let Some(log_dir) = &self.log_dir {
                cache.insert("log_dir".to_string(), log_dir.display().to_string().into());
            }
            if let Some(api_key) = &self.daily_api_key {
                cache.insert("daily.api_key".to_string(), api_key.clone().into());
            }
            if let Some(certificate) = &self.certificate {
                cache.insert("tls.certificate".to_string(), certificate.display().to_string().into());
            }
            if let Some(private_key) = &self.private_key {
                cache.insert("tls.private_key".to_string(), private_key.display().to_string().into());
            }
            Ok(cache)
        }
    }
}

pub fn version() -> String {
    let author = clap::crate_authors!();
    let config_dir_path = crate::get_config_dir().display().to_string();
    let data_dir_path = crate::get_data_dir().display().to_string();

    format!(
        "{}

Authors: {author}

Config directory: {config_dir_path}
Data directory: {data_dir_path}",
        clap::crate_version!()
    )
}
