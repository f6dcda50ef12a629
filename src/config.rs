use crate::graph::EdgeRules;
use anyhow::Context;
use serde::Deserialize;

/// Config, read from the TOML file named on the command line.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// <address>:<port> to serve the REST API
    pub listen_address: String,

    /// <address>:<port> to serve metrics on
    pub metrics_address: String,

    /// By default, output JSON logs. Only if this flag is set to true, output colourful human-friendly logs
    #[serde(default)]
    pub human_logs: bool,

    /// Max JSON body size the API accepts
    #[serde(default = "max_body_size")]
    pub max_body_size: usize,

    /// Max image upload size, in bytes
    #[serde(default = "max_image_size")]
    pub max_image_size: usize,

    /// password to connect to database.
    pub db_dsn: String,

    /// maximum number of connections maintained by PostgresStore
    pub db_pool_size: u32,

    /// maximum seconds waiting for a database connection
    pub db_connection_timeout: u64,

    /// HS256 secret that bearer tokens are signed with
    pub jwt_secret: String,

    /// Directory uploaded images are written under
    #[serde(default = "media_root")]
    pub media_root: String,

    #[serde(default)]
    pub edges: EdgeRules,
}

impl Config {
    pub fn from_file(filepath: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(filepath)
            .with_context(|| format!("couldn't read config file {}", filepath))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        toml::from_str(contents).context("couldn't parse config file")
    }
}

fn max_body_size() -> usize {
    65536
}

fn max_image_size() -> usize {
    5 * 1024 * 1024
}

fn media_root() -> String {
    "./media".to_owned()
}
