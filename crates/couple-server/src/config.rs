use anyhow::{Context, Result};

use couple_interpreter::InterpreterConfig;

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub jwt_secret: String,
    pub interpreter: InterpreterConfig,
}

impl Config {
    /// Read the environment once at startup. A malformed value fails here,
    /// before anything is wired up.
    pub fn from_env() -> Result<Self> {
        let jwt_secret =
            std::env::var("COUPLE_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
        let db_path =
            std::env::var("COUPLE_DB_PATH").unwrap_or_else(|_| "coupleconnect.db".into());
        let host = std::env::var("COUPLE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("COUPLE_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .context("COUPLE_PORT must be a port number")?;

        Ok(Self {
            host,
            port,
            db_path,
            jwt_secret,
            interpreter: InterpreterConfig::from_env(),
        })
    }
}
