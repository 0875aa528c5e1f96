use std::env;
use std::fmt;

const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 587;

/// Error raised when the environment does not describe a usable configuration.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    Missing(&'static str),
    /// A variable is set but could not be parsed.
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => write!(f, "{} has invalid value {:?}", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Credentials and relay for outgoing mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_port: u16,
    pub server_host: String,
    /// Base URL of the web client, used for links in emails.
    pub frontend_url: String,
    /// `None` when `EMAIL_USER`/`EMAIL_PASSWORD` are not both set; mail is then only logged.
    pub smtp: Option<SmtpConfig>,
    pub scheduler_enabled: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let smtp = match (env::var("EMAIL_USER"), env::var("EMAIL_PASSWORD")) {
            (Ok(username), Ok(password)) if !username.is_empty() => Some(SmtpConfig {
                host: env::var("SMTP_HOST").unwrap_or_else(|_| DEFAULT_SMTP_HOST.to_string()),
                port: parse_var("SMTP_PORT", DEFAULT_SMTP_PORT)?,
                username,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            server_port: parse_var("SERVER_PORT", 8080)?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            frontend_url: env::var("FRONTEND_URL").unwrap_or_else(|_| DEFAULT_FRONTEND_URL.to_string()),
            smtp,
            scheduler_enabled: parse_var("SCHEDULER_ENABLED", true)?,
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}
