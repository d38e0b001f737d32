use axum::{ routing::get, Router, Json, extract::State };
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use anyhow::Result;
use std::net::SocketAddr;
use tracing::info;

use crate::{
	analytics::{ Report, SalesAnalytics },
	config::ServerConfig,
	error::ApiError,
	models::{
		CountryAverageOrderValue,
		CustomerTotalSpent,
		MonthlySales,
		NeverOrderedProduct,
		RepeatCustomer,
	},
};

// Shared state for the API. The backend owns the connection pool, which is
// created once at startup and shared by every request.
pub struct AppState<T: SalesAnalytics + Send + Sync + 'static> {
	pub analytics: Arc<T>,
}

type ApiResult<R> = Result<Json<Vec<R>>, ApiError>;

/// Build the router serving every report over the given backend.
pub fn router<T: SalesAnalytics + Send + Sync + 'static>(analytics: T) -> Router {
	let state = Arc::new(AppState {
		analytics: Arc::new(analytics),
	});

	Router::new()
		.route(Report::CustomerTotalSpent.path(), get(customer_total_spent_handler::<T>))
		.route(Report::MonthlySales.path(), get(monthly_sales_handler::<T>))
		.route(Report::NeverOrderedProducts.path(), get(never_ordered_products_handler::<T>))
		.route(Report::AvgOrderValueByCountry.path(), get(avg_order_value_by_country_handler::<T>))
		.route(Report::RepeatCustomers.path(), get(repeat_customers_handler::<T>))
		.with_state(state)
}

// Run the API server with the provided analytics backend
pub async fn run_server<T: SalesAnalytics + Send + Sync + 'static>(
	analytics: T,
	config: ServerConfig
) -> Result<()> {
	let database = analytics.database_name();
	let app = router(analytics);

	let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
	info!("Server running on port {} ({})", config.port, database);

	let listener = TcpListener::bind(addr).await?;
	axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

	info!("Server stopped");
	Ok(())
}

/// Initialize the process-wide log subscriber.
pub fn init_tracing() {
	tracing_subscriber::fmt::init();
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			tracing::error!("Failed to listen for Ctrl+C: {}", e);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut sigterm) => {
				sigterm.recv().await;
			}
			Err(e) => {
				tracing::error!("Failed to listen for SIGTERM: {}", e);
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}

	info!("Shutdown signal received");
}

async fn customer_total_spent_handler<T: SalesAnalytics + Send + Sync + 'static>(State(
	state,
): State<Arc<AppState<T>>>) -> ApiResult<CustomerTotalSpent> {
	let rows = state.analytics
		.customer_total_spent().await
		.map_err(|e| ApiError::query(Report::CustomerTotalSpent, e))?;
	Ok(Json(rows))
}

async fn monthly_sales_handler<T: SalesAnalytics + Send + Sync + 'static>(State(
	state,
): State<Arc<AppState<T>>>) -> ApiResult<MonthlySales> {
	let rows = state.analytics
		.monthly_sales().await
		.map_err(|e| ApiError::query(Report::MonthlySales, e))?;
	Ok(Json(rows))
}

async fn never_ordered_products_handler<T: SalesAnalytics + Send + Sync + 'static>(State(
	state,
): State<Arc<AppState<T>>>) -> ApiResult<NeverOrderedProduct> {
	let rows = state.analytics
		.never_ordered_products().await
		.map_err(|e| ApiError::query(Report::NeverOrderedProducts, e))?;
	Ok(Json(rows))
}

async fn avg_order_value_by_country_handler<T: SalesAnalytics + Send + Sync + 'static>(State(
	state,
): State<Arc<AppState<T>>>) -> ApiResult<CountryAverageOrderValue> {
	let rows = state.analytics
		.avg_order_value_by_country().await
		.map_err(|e| ApiError::query(Report::AvgOrderValueByCountry, e))?;
	Ok(Json(rows))
}

async fn repeat_customers_handler<T: SalesAnalytics + Send + Sync + 'static>(State(
	state,
): State<Arc<AppState<T>>>) -> ApiResult<RepeatCustomer> {
	let rows = state.analytics
		.repeat_customers().await
		.map_err(|e| ApiError::query(Report::RepeatCustomers, e))?;
	Ok(Json(rows))
}
