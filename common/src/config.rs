//! Environment configuration, read once at startup.
//!
//! A `.env` file in the working directory is loaded first when present;
//! variables already set in the process environment win.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MYSQL_HOST: &str = "localhost";
pub const DEFAULT_MYSQL_PORT: u16 = 3306;
pub const DEFAULT_CONNECTION_LIMIT: u32 = 10;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_SQLITE_PATH: &str = "./data/sales.db";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
	#[error("missing required environment variable {0}")]
	Missing(&'static str),

	#[error("invalid value {value:?} for {key}")]
	Invalid {
		key: &'static str,
		value: String,
	},
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
	pub port: u16,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self { port: DEFAULT_PORT }
	}
}

impl ServerConfig {
	pub fn from_env() -> Result<Self, ConfigError> {
		load_dotenv();
		Self::from_lookup(env_lookup)
	}

	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
		where F: Fn(&str) -> Option<String>
	{
		Ok(Self {
			port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
		})
	}
}

/// MySQL connection settings for the pool.
#[derive(Clone, PartialEq, Eq)]
pub struct MySqlConfig {
	pub host: String,
	pub user: String,
	pub password: String,
	pub database: String,
	pub port: u16,
	pub connection_limit: u32,
	/// How long a request waits for a pooled connection before failing.
	pub acquire_timeout: Duration,
}

// Keeps the password out of logs.
impl std::fmt::Debug for MySqlConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MySqlConfig")
			.field("host", &self.host)
			.field("user", &self.user)
			.field("password", &"***")
			.field("database", &self.database)
			.field("port", &self.port)
			.field("connection_limit", &self.connection_limit)
			.field("acquire_timeout", &self.acquire_timeout)
			.finish()
	}
}

impl MySqlConfig {
	pub fn from_env() -> Result<Self, ConfigError> {
		load_dotenv();
		Self::from_lookup(env_lookup)
	}

	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
		where F: Fn(&str) -> Option<String>
	{
		let acquire_timeout_secs = parse_or(
			&lookup,
			"DB_ACQUIRE_TIMEOUT_SECS",
			DEFAULT_ACQUIRE_TIMEOUT_SECS
		)?;

		Ok(Self {
			host: lookup("DB_HOST")
				.filter(|host| !host.is_empty())
				.unwrap_or_else(|| DEFAULT_MYSQL_HOST.to_string()),
			user: required(&lookup, "DB_USER")?,
			password: lookup("DB_PASSWORD").unwrap_or_default(),
			database: required(&lookup, "DB_DATABASE")?,
			port: parse_or(&lookup, "DB_PORT", DEFAULT_MYSQL_PORT)?,
			connection_limit: parse_or(&lookup, "DB_CONNECTION_LIMIT", DEFAULT_CONNECTION_LIMIT)?,
			acquire_timeout: Duration::from_secs(acquire_timeout_secs),
		})
	}
}

/// Embedded SQLite settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
	pub path: PathBuf,
	/// Number of random customers to seed into an empty database.
	pub seed_customers: Option<usize>,
}

impl SqliteConfig {
	pub fn from_env() -> Result<Self, ConfigError> {
		load_dotenv();
		Self::from_lookup(env_lookup)
	}

	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
		where F: Fn(&str) -> Option<String>
	{
		let path = lookup("SQLITE_PATH")
			.filter(|path| !path.is_empty())
			.unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string());

		let seed_customers = match lookup("SQLITE_SEED_CUSTOMERS") {
			Some(value) => Some(parse_value("SQLITE_SEED_CUSTOMERS", &value)?),
			None => None,
		};

		Ok(Self { path: PathBuf::from(path), seed_customers })
	}
}

fn load_dotenv() {
	// A missing .env file is the normal case in production.
	let _ = dotenvy::dotenv();
}

fn env_lookup(key: &str) -> Option<String> {
	std::env::var(key).ok()
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
	where F: Fn(&str) -> Option<String>
{
	lookup(key)
		.filter(|value| !value.is_empty())
		.ok_or(ConfigError::Missing(key))
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
	where F: Fn(&str) -> Option<String>, T: FromStr
{
	match lookup(key) {
		Some(value) if !value.is_empty() => parse_value(key, &value),
		_ => Ok(default),
	}
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
	value.trim().parse().map_err(|_| ConfigError::Invalid {
		key,
		value: value.to_string(),
	})
}
