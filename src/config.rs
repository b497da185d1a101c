// src/config.rs

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use dotenvy::dotenv;

use crate::error::AppError;
use crate::services::tree::DEFAULT_MAX_ANCESTOR_DEPTH;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. When unset the in-memory store is used.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub log_dir: String,
    pub bind_addr: SocketAddr,
    /// Upper bound on the parent chain walked while building a comment thread.
    pub max_reply_depth: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| AppError::InternalServerError("JWT_SECRET must be set".to_string()))?;

        let jwt_expiration = parse_or("JWT_EXPIRATION", 86_400)?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());

        let bind_addr = parse_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?;

        let max_reply_depth =
            check_reply_depth(parse_or("MAX_REPLY_DEPTH", DEFAULT_MAX_ANCESTOR_DEPTH)?)?;

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            log_dir,
            bind_addr,
            max_reply_depth,
        })
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::InternalServerError(format!("{key} has an invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}

/// A depth of 0 would accept direct replies but reject every reply to a reply.
fn check_reply_depth(depth: usize) -> Result<usize, AppError> {
    if depth == 0 {
        return Err(AppError::InternalServerError(
            "MAX_REPLY_DEPTH must be at least 1".to_string(),
        ));
    }
    Ok(depth)
}
