pub mod config {
    use serde::Deserialize;

    #[derive(Deserialize, Debug, Clone)]
    pub struct Config {
        pub db_url: String,
        #[serde(default = "default_port")]
        pub port: u16,
        pub jwt_secret: String,
        /// Lifetime of issued access tokens.
        #[serde(default = "default_token_ttl_minutes")]
        pub token_ttl_minutes: i64,
        /// Comma-separated browser origins allowed to call the API.
        /// When unset any origin is allowed.
        #[serde(default)]
        pub cors_allowed_origins: Option<String>,
    }

    impl Config {
        /// Loads configuration from environment variables.
        pub fn from_env() -> anyhow::Result<Self> {
            let settings = config::Config::builder()
                .add_source(config::Environment::default())
                .build()?;

            let config: Config = settings.try_deserialize()?;
            Ok(config)
        }
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_token_ttl_minutes() -> i64 {
        60
    }

}

pub mod auth;
pub mod entities;
pub mod task;
pub mod timer;
pub mod web;
