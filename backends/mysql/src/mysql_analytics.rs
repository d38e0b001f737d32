use anyhow::{ Context, Result };
use async_trait::async_trait;
use common::{
	analytics::{ Report, SalesAnalytics },
	config::MySqlConfig,
	models::{
		CountryAverageOrderValue,
		CustomerTotalSpent,
		MonthlySales,
		NeverOrderedProduct,
		RepeatCustomer,
	},
};
use sqlx::mysql::{ MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow };
use sqlx::Row;
use tracing::debug;

const CUSTOMER_TOTAL_SPENT: &str =
	"SELECT
		customers.customer_id,
		customers.name,
		customers.email,
		SUM(order_items.quantity * order_items.unit_price) AS total_spent
	FROM customers
	JOIN orders ON customers.customer_id = orders.customer_id
	JOIN order_items ON orders.order_id = order_items.order_id
	GROUP BY customers.customer_id, customers.name, customers.email
	ORDER BY total_spent DESC";

const MONTHLY_SALES: &str =
	"SELECT
		YEAR(orders.order_date) AS year,
		MONTH(orders.order_date) AS month,
		SUM(order_items.quantity * order_items.unit_price) AS total_price
	FROM orders
	JOIN order_items ON orders.order_id = order_items.order_id
	WHERE orders.status IN ('Shipped', 'Delivered')
	GROUP BY year, month
	ORDER BY year DESC, month DESC";

const NEVER_ORDERED_PRODUCTS: &str =
	"SELECT
		products.product_id,
		products.name,
		products.category,
		products.price
	FROM products
	LEFT JOIN order_items ON products.product_id = order_items.product_id
	WHERE order_items.product_id IS NULL";

// Rolls up to one total per order first, then averages those totals.
const AVG_ORDER_VALUE_BY_COUNTRY: &str =
	"SELECT
		customers.country,
		AVG(order_values.order_total) AS avg_order_value
	FROM (
		SELECT
			orders.order_id,
			orders.customer_id,
			SUM(order_items.quantity * order_items.unit_price) AS order_total
		FROM orders
		JOIN order_items ON orders.order_id = order_items.order_id
		GROUP BY orders.order_id, orders.customer_id
	) AS order_values
	JOIN customers ON order_values.customer_id = customers.customer_id
	GROUP BY customers.country
	ORDER BY avg_order_value DESC";

const REPEAT_CUSTOMERS: &str =
	"SELECT
		customers.customer_id,
		customers.name,
		customers.email,
		COUNT(orders.order_id) AS order_count
	FROM customers
	JOIN orders ON customers.customer_id = orders.customer_id
	GROUP BY customers.customer_id, customers.name, customers.email
	HAVING COUNT(orders.order_id) > 1
	ORDER BY order_count DESC";

/// MySQL text of each report.
pub fn query_for(report: Report) -> &'static str {
	match report {
		Report::CustomerTotalSpent => CUSTOMER_TOTAL_SPENT,
		Report::MonthlySales => MONTHLY_SALES,
		Report::NeverOrderedProducts => NEVER_ORDERED_PRODUCTS,
		Report::AvgOrderValueByCountry => AVG_ORDER_VALUE_BY_COUNTRY,
		Report::RepeatCustomers => REPEAT_CUSTOMERS,
	}
}

/// Maps one result row of a catalog query to its report row.
pub trait FromMySqlRow: Sized {
	fn from_mysql_row(row: &MySqlRow) -> Result<Self, sqlx::Error>;
}

impl FromMySqlRow for CustomerTotalSpent {
	fn from_mysql_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
		Ok(CustomerTotalSpent {
			customer_id: row.try_get("customer_id")?,
			name: row.try_get("name")?,
			email: row.try_get("email")?,
			total_spent: row.try_get("total_spent")?,
		})
	}
}

impl FromMySqlRow for MonthlySales {
	fn from_mysql_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
		Ok(MonthlySales {
			year: row.try_get("year")?,
			month: row.try_get("month")?,
			total_price: row.try_get("total_price")?,
		})
	}
}

impl FromMySqlRow for NeverOrderedProduct {
	fn from_mysql_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
		Ok(NeverOrderedProduct {
			product_id: row.try_get("product_id")?,
			name: row.try_get("name")?,
			category: row.try_get("category")?,
			price: row.try_get("price")?,
		})
	}
}

impl FromMySqlRow for CountryAverageOrderValue {
	fn from_mysql_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
		Ok(CountryAverageOrderValue {
			country: row.try_get("country")?,
			avg_order_value: row.try_get("avg_order_value")?,
		})
	}
}

impl FromMySqlRow for RepeatCustomer {
	fn from_mysql_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
		Ok(RepeatCustomer {
			customer_id: row.try_get("customer_id")?,
			name: row.try_get("name")?,
			email: row.try_get("email")?,
			order_count: row.try_get("order_count")?,
		})
	}
}

pub fn connect_options(config: &MySqlConfig) -> MySqlConnectOptions {
	MySqlConnectOptions::new()
		.host(&config.host)
		.port(config.port)
		.username(&config.user)
		.password(&config.password)
		.database(&config.database)
}

pub fn pool_options(config: &MySqlConfig) -> MySqlPoolOptions {
	MySqlPoolOptions::new()
		.max_connections(config.connection_limit)
		.acquire_timeout(config.acquire_timeout)
}

pub struct MySqlAnalytics {
	pool: MySqlPool,
}

impl MySqlAnalytics {
	/// Creates the pool without connecting. Connections are opened on first
	/// use, so an unreachable server shows up as failed requests.
	pub fn new(config: &MySqlConfig) -> Self {
		let pool = pool_options(config).connect_lazy_with(connect_options(config));
		Self { pool }
	}

	pub fn pool(&self) -> &MySqlPool {
		&self.pool
	}

	// Runs one catalog query; the connection goes back to the pool whether
	// or not it succeeds.
	async fn fetch<R: FromMySqlRow + Send>(&self, report: Report) -> Result<Vec<R>> {
		debug!(report = %report, "Running report query");

		let rows = sqlx
			::query(query_for(report))
			.fetch_all(&self.pool).await?;

		rows.iter()
			.map(R::from_mysql_row)
			.collect::<Result<Vec<_>, _>>()
			.context("row decoding failed")
	}
}

#[async_trait]
impl SalesAnalytics for MySqlAnalytics {
	fn database_name(&self) -> String {
		"MySQL".to_string()
	}

	async fn customer_total_spent(&self) -> Result<Vec<CustomerTotalSpent>> {
		self.fetch(Report::CustomerTotalSpent).await
	}

	async fn monthly_sales(&self) -> Result<Vec<MonthlySales>> {
		self.fetch(Report::MonthlySales).await
	}

	async fn never_ordered_products(&self) -> Result<Vec<NeverOrderedProduct>> {
		self.fetch(Report::NeverOrderedProducts).await
	}

	async fn avg_order_value_by_country(&self) -> Result<Vec<CountryAverageOrderValue>> {
		self.fetch(Report::AvgOrderValueByCountry).await
	}

	async fn repeat_customers(&self) -> Result<Vec<RepeatCustomer>> {
		self.fetch(Report::RepeatCustomers).await
	}
}

#[cfg(test)]
mod tests {
	use std::time::{ Duration, Instant };

	use axum::{ body::{ to_bytes, Body }, http::{ Request, StatusCode } };
	use common::{ models::OrderStatus, server::router };
	use rust_decimal::Decimal;
	use serde_json::{ json, Value };
	use tower::ServiceExt;

	use super::*;

	fn config() -> MySqlConfig {
		MySqlConfig {
			host: "127.0.0.1".to_string(),
			user: "reporter".to_string(),
			password: "secret".to_string(),
			database: "shop".to_string(),
			// Nothing listens here, connections are refused immediately.
			port: 1,
			connection_limit: 10,
			acquire_timeout: Duration::from_secs(1),
		}
	}

	fn unreachable_analytics() -> MySqlAnalytics {
		MySqlAnalytics::new(&config())
	}

	#[test]
	fn monthly_sales_filters_on_sale_statuses() {
		let allow_list = OrderStatus::SALES.iter()
			.map(|status| format!("'{}'", status))
			.collect::<Vec<_>>()
			.join(", ");
		assert!(MONTHLY_SALES.contains(&format!("IN ({})", allow_list)));
		assert!(MONTHLY_SALES.contains("ORDER BY year DESC, month DESC"));
	}

	#[test]
	fn avg_by_country_averages_per_order_totals() {
		let sql = query_for(Report::AvgOrderValueByCountry);
		assert!(sql.contains("GROUP BY orders.order_id, orders.customer_id"));
		assert!(sql.contains("AVG(order_values.order_total)"));
		assert!(!sql.contains("AVG(order_items"));
	}

	#[test]
	fn never_ordered_uses_left_join_null_check() {
		let sql = query_for(Report::NeverOrderedProducts);
		assert!(sql.contains("LEFT JOIN order_items"));
		assert!(sql.contains("WHERE order_items.product_id IS NULL"));
	}

	#[test]
	fn catalog_queries_take_no_parameters() {
		for report in Report::ALL {
			assert!(!query_for(report).contains('?'), "{}", report);
			assert!(query_for(report).trim_start().starts_with("SELECT"), "{}", report);
		}
	}

	#[test]
	fn pool_is_bounded_by_connection_limit() {
		let mut config = config();
		config.connection_limit = 7;
		assert_eq!(pool_options(&config).get_max_connections(), 7);
	}

	#[test]
	fn pool_waits_at_most_the_acquire_timeout() {
		let mut config = config();
		config.acquire_timeout = Duration::from_secs(3);
		assert_eq!(pool_options(&config).get_acquire_timeout(), Duration::from_secs(3));
	}

	#[tokio::test]
	async fn lazy_pool_does_not_connect_at_startup() {
		let analytics = MySqlAnalytics::new(&config());
		assert_eq!(analytics.pool().size(), 0);
		assert_eq!(analytics.database_name(), "MySQL");
	}

	#[tokio::test]
	async fn unreachable_database_fails_every_report() {
		let analytics = unreachable_analytics();
		assert!(analytics.customer_total_spent().await.is_err());
		assert!(analytics.monthly_sales().await.is_err());
		assert!(analytics.never_ordered_products().await.is_err());
		assert!(analytics.avg_order_value_by_country().await.is_err());
		assert!(analytics.repeat_customers().await.is_err());
	}

	#[tokio::test]
	async fn unreachable_database_fails_within_the_acquire_timeout() {
		let analytics = unreachable_analytics();

		let started = Instant::now();
		let err = analytics.repeat_customers().await.unwrap_err();
		assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());

		// The report name is added once, by the HTTP error.
		assert!(!format!("{:#}", err).contains("repeat customers"));
	}

	#[tokio::test]
	async fn unreachable_database_returns_500_over_http() {
		let app = router(unreachable_analytics());
		for report in Report::ALL {
			let response = app
				.clone()
				.oneshot(Request::builder().uri(report.path()).body(Body::empty()).unwrap()).await
				.unwrap();
			assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

			let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
			let body: Value = serde_json::from_slice(&bytes).unwrap();
			assert_eq!(body, json!({ "error": "Internal server error" }));
		}
	}

	// Live tests against a seeded database.
	// Run with: DB_HOST=... DB_USER=... DB_DATABASE=... cargo test -p analytics-mysql -- --ignored

	fn live_config() -> MySqlConfig {
		MySqlConfig::from_env().expect("DB_USER and DB_DATABASE required")
	}

	#[tokio::test]
	#[ignore = "requires database"]
	async fn live_reports_are_sorted() {
		let analytics = MySqlAnalytics::new(&live_config());

		let totals = analytics.customer_total_spent().await.expect("total spent failed");
		assert!(totals.windows(2).all(|w| w[0].total_spent >= w[1].total_spent));

		let months = analytics.monthly_sales().await.expect("monthly sales failed");
		assert!(months.windows(2).all(|w| (w[0].year, w[0].month) > (w[1].year, w[1].month)));

		let countries = analytics.avg_order_value_by_country().await.expect("avg by country failed");
		assert!(countries.windows(2).all(|w| w[0].avg_order_value >= w[1].avg_order_value));

		let repeat = analytics.repeat_customers().await.expect("repeat customers failed");
		assert!(repeat.iter().all(|customer| customer.order_count > 1));
		assert!(repeat.windows(2).all(|w| w[0].order_count >= w[1].order_count));

		analytics.never_ordered_products().await.expect("never ordered failed");
	}

	// Rebuilt on every run; DB_TEST_DATABASE must name a scratch database.
	const FIXTURE_SHOP: [&str; 12] = [
		"CREATE TABLE IF NOT EXISTS customers (
			customer_id INT PRIMARY KEY,
			name VARCHAR(100),
			email VARCHAR(255),
			country VARCHAR(100)
		)",
		"CREATE TABLE IF NOT EXISTS products (
			product_id INT PRIMARY KEY,
			name VARCHAR(100),
			category VARCHAR(100),
			price DECIMAL(10, 2)
		)",
		"CREATE TABLE IF NOT EXISTS orders (
			order_id INT PRIMARY KEY,
			customer_id INT NOT NULL,
			order_date DATE NOT NULL,
			status VARCHAR(20) NOT NULL,
			FOREIGN KEY (customer_id) REFERENCES customers (customer_id)
		)",
		"CREATE TABLE IF NOT EXISTS order_items (
			order_item_id INT AUTO_INCREMENT PRIMARY KEY,
			order_id INT NOT NULL,
			product_id INT NOT NULL,
			quantity INT NOT NULL,
			unit_price DECIMAL(10, 2) NOT NULL,
			FOREIGN KEY (order_id) REFERENCES orders (order_id),
			FOREIGN KEY (product_id) REFERENCES products (product_id)
		)",
		"DELETE FROM order_items",
		"DELETE FROM orders",
		"DELETE FROM products",
		"DELETE FROM customers",
		"INSERT INTO customers (customer_id, name, email, country) VALUES
			(1, 'Ada', 'ada@example.com', 'France'),
			(2, 'Bob', 'bob@example.com', 'USA'),
			(3, 'Cleo', 'cleo@example.com', 'Japan'),
			(4, 'Dan', 'dan@example.com', 'Japan')",
		"INSERT INTO products (product_id, name, category, price) VALUES
			(1, 'Laptop', 'Electronics', 1000.00),
			(2, 'Novel', 'Books', 25.00),
			(3, 'Pen', 'Office', 2.50),
			(4, 'Lamp', 'Home', 40.00),
			(5, 'Desk', 'Home', 300.00)",
		"INSERT INTO orders (order_id, customer_id, order_date, status) VALUES
			(1, 1, '2024-01-10', 'Delivered'),
			(2, 1, '2024-02-14', 'Shipped'),
			(3, 2, '2024-02-05', 'Pending'),
			(4, 3, '2024-02-20', 'Shipped'),
			(5, 3, '2023-12-31', 'Cancelled'),
			(6, 3, '2024-01-25', 'Delivered')",
		"INSERT INTO order_items (order_id, product_id, quantity, unit_price) VALUES
			(1, 2, 4, 25.00),
			(2, 3, 20, 2.50),
			(2, 2, 10, 25.00),
			(3, 1, 1, 1000.00),
			(4, 2, 2, 25.00),
			(5, 3, 4, 2.50),
			(6, 2, 1, 24.50)",
	];

	fn fixture_config() -> MySqlConfig {
		MySqlConfig::from_lookup(|key| {
			match key {
				"DB_DATABASE" => std::env::var("DB_TEST_DATABASE").ok(),
				key => std::env::var(key).ok(),
			}
		}).expect("DB_USER and DB_TEST_DATABASE required")
	}

	// Run with: DB_USER=... DB_TEST_DATABASE=... cargo test -p analytics-mysql -- --ignored
	#[tokio::test]
	#[ignore = "requires database"]
	async fn live_fixture_shop_matches_expected_reports() {
		let analytics = MySqlAnalytics::new(&fixture_config());
		for statement in FIXTURE_SHOP {
			sqlx::query(statement).execute(analytics.pool()).await.expect(statement);
		}

		let totals: Vec<_> = analytics
			.customer_total_spent().await
			.expect("total spent failed")
			.into_iter()
			.map(|row| (row.customer_id, row.total_spent))
			.collect();
		assert_eq!(
			totals,
			vec![(2, Decimal::new(1000, 0)), (1, Decimal::new(400, 0)), (3, Decimal::new(845, 1))]
		);

		let months = analytics.monthly_sales().await.expect("monthly sales failed");
		assert_eq!(
			months,
			vec![
				MonthlySales { year: Some(2024), month: Some(2), total_price: Decimal::new(350, 0) },
				MonthlySales { year: Some(2024), month: Some(1), total_price: Decimal::new(1245, 1) }
			]
		);

		let mut never: Vec<_> = analytics
			.never_ordered_products().await
			.expect("never ordered failed")
			.into_iter()
			.map(|row| row.product_id)
			.collect();
		never.sort();
		assert_eq!(never, vec![4, 5]);

		let averages: Vec<_> = analytics
			.avg_order_value_by_country().await
			.expect("avg by country failed")
			.into_iter()
			.map(|row| (row.country.unwrap_or_default(), row.avg_order_value))
			.collect();
		assert_eq!(
			averages,
			vec![
				("USA".to_string(), Decimal::new(1000, 0)),
				("France".to_string(), Decimal::new(200, 0)),
				("Japan".to_string(), Decimal::new(28_166_667, 6))
			]
		);

		let repeat: Vec<_> = analytics
			.repeat_customers().await
			.expect("repeat customers failed")
			.into_iter()
			.map(|row| (row.name.unwrap_or_default(), row.order_count))
			.collect();
		assert_eq!(repeat, vec![("Cleo".to_string(), 3), ("Ada".to_string(), 2)]);

		sqlx::query("UPDATE orders SET status = 'Pending' WHERE order_id = 2")
			.execute(analytics.pool()).await
			.expect("status update failed");
		let months = analytics.monthly_sales().await.expect("monthly sales failed");
		assert_eq!(months[0].total_price, Decimal::new(50, 0));
	}

	#[tokio::test]
	#[ignore = "requires database"]
	async fn concurrent_requests_share_the_pool() {
		let config = live_config();
		let analytics = std::sync::Arc::new(MySqlAnalytics::new(&config));

		let handles: Vec<_> = (0..25)
			.map(|_| {
				let analytics = analytics.clone();
				tokio::spawn(async move { analytics.repeat_customers().await })
			})
			.collect();

		for handle in handles {
			handle.await.expect("task panicked").expect("query failed");
		}
		assert!(analytics.pool().size() <= config.connection_limit);
	}
}
