use anyhow::Result;
mod mysql_analytics;

use crate::mysql_analytics::MySqlAnalytics;
use common::config::{ MySqlConfig, ServerConfig };
use common::server::{ init_tracing, run_server };
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
	init_tracing();

	let server_config = ServerConfig::from_env()?;
	let mysql_config = MySqlConfig::from_env()?;
	info!(
		host = %mysql_config.host,
		port = mysql_config.port,
		database = %mysql_config.database,
		connection_limit = mysql_config.connection_limit,
		acquire_timeout = ?mysql_config.acquire_timeout,
		"Creating MySQL connection pool"
	);

	let analytics = MySqlAnalytics::new(&mysql_config);
	let pool = analytics.pool().clone();

	run_server(analytics, server_config).await?;

	pool.close().await;
	info!("Connection pool closed");

	Ok(())
}
