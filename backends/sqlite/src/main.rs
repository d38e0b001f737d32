use anyhow::Result;
mod sample_data;
mod sqlite_analytics;

use crate::sqlite_analytics::SqliteAnalytics;
use common::config::{ ServerConfig, SqliteConfig };
use common::server::{ init_tracing, run_server };
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
	init_tracing();

	let server_config = ServerConfig::from_env()?;
	let sqlite_config = SqliteConfig::from_env()?;

	let analytics = if sqlite_config.path.as_os_str() == ":memory:" {
		SqliteAnalytics::open_in_memory().await?
	} else {
		SqliteAnalytics::open(&sqlite_config.path).await?
	};
	analytics.init().await?;
	info!("Opened SQLite database at {}", analytics.db_path());

	if let Some(customers) = sqlite_config.seed_customers {
		if analytics.is_empty().await? {
			analytics.generate_sample_data(customers).await?;
		} else {
			info!("Database already has data, skipping sample data");
		}
	}

	run_server(analytics, server_config).await?;

	Ok(())
}
