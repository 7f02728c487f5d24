pub mod config {
    use serde::Deserialize;

    #[derive(Deserialize, Debug, Clone)]
    pub struct Config {
        pub db_url: String,
        #[serde(default = "default_port")]
        pub port: u16,
        pub jwt_secret: String,
        /// Login of an account created at start-up when it does not exist yet.
        #[serde(default)]
        pub admin_login: Option<String>,
        #[serde(default)]
        pub admin_password: Option<String>,
        #[serde(default = "default_admin_full_name")]
        pub admin_full_name: String,
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

        /// Returns the bootstrap admin credentials when both halves are configured.
        pub fn admin_credentials(&self) -> Option<(&str, &str)> {
            match (&self.admin_login, &self.admin_password) {
                (Some(login), Some(password)) if !login.is_empty() && !password.is_empty() => {
                    Some((login, password))
                }
                _ => None,
            }
        }
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_admin_full_name() -> String {
        "Администратор".to_string()
    }

}
pub mod auth;
pub mod entities;
pub mod stats;
pub mod task;
pub mod user;
pub mod web;
