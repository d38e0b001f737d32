use anyhow::{ Context, Result };
use async_trait::async_trait;
use common::{
	analytics::{ Report, SalesAnalytics },
	models::{
		CountryAverageOrderValue,
		Customer,
		CustomerTotalSpent,
		MonthlySales,
		NeverOrderedProduct,
		Order,
		OrderItem,
		Product,
		RepeatCustomer,
	},
};
use rusqlite::{ params, types::Type, Row };
use rust_decimal::Decimal;
use std::path::Path;
use tokio_rusqlite::Connection as AsyncConnection;
use tracing::{ debug, info };

use crate::sample_data::SampleData;

// Amounts are stored as REAL; aggregates are rounded back to this many
// decimal places when read.
const AMOUNT_SCALE: u32 = 6;

const SCHEMA: &str =
	"CREATE TABLE IF NOT EXISTS customers (
		customer_id INTEGER PRIMARY KEY,
		name TEXT,
		email TEXT,
		country TEXT
	);
	CREATE TABLE IF NOT EXISTS products (
		product_id INTEGER PRIMARY KEY,
		name TEXT,
		category TEXT,
		price REAL
	);
	CREATE TABLE IF NOT EXISTS orders (
		order_id INTEGER PRIMARY KEY,
		customer_id INTEGER NOT NULL REFERENCES customers (customer_id),
		order_date TEXT NOT NULL,
		status TEXT NOT NULL
	);
	CREATE TABLE IF NOT EXISTS order_items (
		order_item_id INTEGER PRIMARY KEY,
		order_id INTEGER NOT NULL REFERENCES orders (order_id),
		product_id INTEGER NOT NULL REFERENCES products (product_id),
		quantity INTEGER NOT NULL CHECK (quantity > 0),
		unit_price REAL NOT NULL CHECK (unit_price >= 0)
	);
	CREATE INDEX IF NOT EXISTS idx_orders_customer_id ON orders (customer_id);
	CREATE INDEX IF NOT EXISTS idx_order_items_order_id ON order_items (order_id);
	CREATE INDEX IF NOT EXISTS idx_order_items_product_id ON order_items (product_id);";

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
		CAST(strftime('%Y', orders.order_date) AS INTEGER) AS year,
		CAST(strftime('%m', orders.order_date) AS INTEGER) AS month,
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

/// SQLite text of each report.
pub fn query_for(report: Report) -> &'static str {
	match report {
		Report::CustomerTotalSpent => CUSTOMER_TOTAL_SPENT,
		Report::MonthlySales => MONTHLY_SALES,
		Report::NeverOrderedProducts => NEVER_ORDERED_PRODUCTS,
		Report::AvgOrderValueByCountry => AVG_ORDER_VALUE_BY_COUNTRY,
		Report::RepeatCustomers => REPEAT_CUSTOMERS,
	}
}

fn amount(row: &Row<'_>, column: &str) -> rusqlite::Result<Decimal> {
	let value: f64 = row.get(column)?;
	to_amount(row, column, value)
}

fn optional_amount(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<Decimal>> {
	let value: Option<f64> = row.get(column)?;
	value.map(|value| to_amount(row, column, value)).transpose()
}

fn to_amount(row: &Row<'_>, column: &str, value: f64) -> rusqlite::Result<Decimal> {
	match Decimal::from_f64_retain(value) {
		Some(amount) => Ok(amount.round_dp(AMOUNT_SCALE).normalize()),
		None => {
			let idx = row.as_ref().column_index(column)?;
			Err(
				rusqlite::Error::FromSqlConversionFailure(
					idx,
					Type::Real,
					format!("{} is not a representable amount", value).into()
				)
			)
		}
	}
}

/// Maps one result row of a catalog query to its report row.
pub trait FromSqliteRow: Sized {
	fn from_sqlite_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

impl FromSqliteRow for CustomerTotalSpent {
	fn from_sqlite_row(row: &Row<'_>) -> rusqlite::Result<Self> {
		Ok(CustomerTotalSpent {
			customer_id: row.get("customer_id")?,
			name: row.get("name")?,
			email: row.get("email")?,
			total_spent: amount(row, "total_spent")?,
		})
	}
}

impl FromSqliteRow for MonthlySales {
	fn from_sqlite_row(row: &Row<'_>) -> rusqlite::Result<Self> {
		Ok(MonthlySales {
			year: row.get("year")?,
			month: row.get("month")?,
			total_price: amount(row, "total_price")?,
		})
	}
}

impl FromSqliteRow for NeverOrderedProduct {
	fn from_sqlite_row(row: &Row<'_>) -> rusqlite::Result<Self> {
		Ok(NeverOrderedProduct {
			product_id: row.get("product_id")?,
			name: row.get("name")?,
			category: row.get("category")?,
			price: optional_amount(row, "price")?,
		})
	}
}

impl FromSqliteRow for CountryAverageOrderValue {
	fn from_sqlite_row(row: &Row<'_>) -> rusqlite::Result<Self> {
		Ok(CountryAverageOrderValue {
			country: row.get("country")?,
			avg_order_value: amount(row, "avg_order_value")?,
		})
	}
}

impl FromSqliteRow for RepeatCustomer {
	fn from_sqlite_row(row: &Row<'_>) -> rusqlite::Result<Self> {
		Ok(RepeatCustomer {
			customer_id: row.get("customer_id")?,
			name: row.get("name")?,
			email: row.get("email")?,
			order_count: row.get("order_count")?,
		})
	}
}

pub struct SqliteAnalytics {
	db_path: String,
	conn: AsyncConnection,
}

impl SqliteAnalytics {
	pub async fn open(path: &Path) -> Result<Self> {
		// Create data directory if it doesn't exist
		if let Some(data_dir) = path.parent() {
			if !data_dir.as_os_str().is_empty() && !data_dir.exists() {
				std::fs::create_dir_all(data_dir)?;
			}
		}

		let conn = AsyncConnection::open(path).await?;
		Self::configure(&conn, true).await?;

		Ok(Self {
			db_path: path.display().to_string(),
			conn,
		})
	}

	pub async fn open_in_memory() -> Result<Self> {
		let conn = AsyncConnection::open_in_memory().await?;
		Self::configure(&conn, false).await?;

		Ok(Self {
			db_path: ":memory:".to_string(),
			conn,
		})
	}

	async fn configure(conn: &AsyncConnection, wal: bool) -> Result<()> {
		conn.call(move |conn| {
			if wal {
				debug!("Setting PRAGMA journal_mode = WAL");
				let _ = conn.prepare("PRAGMA journal_mode = WAL")?.query([])?;
			}

			debug!("Setting PRAGMA busy_timeout = 5000");
			let _ = conn.prepare("PRAGMA busy_timeout = 5000")?.query([])?;

			debug!("Setting PRAGMA foreign_keys = ON");
			conn.execute("PRAGMA foreign_keys = ON", [])?;

			Ok(())
		}).await?;

		Ok(())
	}

	pub fn db_path(&self) -> &str {
		&self.db_path
	}

	/// Create the four tables and their indexes if missing.
	pub async fn init(&self) -> Result<()> {
		self.conn
			.call(|conn| {
				conn.execute_batch(SCHEMA)?;
				Ok(())
			}).await
			.context("Failed to create schema")?;

		Ok(())
	}

	pub async fn is_empty(&self) -> Result<bool> {
		let customers: i64 = self.conn.call(|conn| {
			Ok(conn.query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))?)
		}).await?;

		Ok(customers == 0)
	}

	/// Fill the database with a random shop of `customers` customers.
	pub async fn generate_sample_data(&self, customers: usize) -> Result<()> {
		let data = SampleData::generate(customers);
		info!(
			customers = data.customers.len(),
			products = data.products.len(),
			orders = data.orders.len(),
			order_items = data.order_items.len(),
			"Generating sample data"
		);

		self.insert_customers(data.customers).await?;
		self.insert_products(data.products).await?;
		self.insert_orders(data.orders).await?;
		self.insert_order_items(data.order_items).await?;

		Ok(())
	}

	pub async fn insert_customers(&self, customers: Vec<Customer>) -> Result<()> {
		self.conn.call(move |conn| {
			let tx = conn.transaction()?;

			for customer in &customers {
				tx.execute(
					"INSERT INTO customers (customer_id, name, email, country) VALUES (?, ?, ?, ?)",
					params![customer.customer_id, customer.name, customer.email, customer.country]
				)?;
			}

			tx.commit()?;
			Ok(())
		}).await?;

		Ok(())
	}

	pub async fn insert_products(&self, products: Vec<Product>) -> Result<()> {
		self.conn.call(move |conn| {
			let tx = conn.transaction()?;

			for product in &products {
				tx.execute(
					"INSERT INTO products (product_id, name, category, price) VALUES (?, ?, ?, ?)",
					params![
						product.product_id,
						product.name,
						product.category,
						product.price.to_string()
					]
				)?;
			}

			tx.commit()?;
			Ok(())
		}).await?;

		Ok(())
	}

	pub async fn insert_orders(&self, orders: Vec<Order>) -> Result<()> {
		self.conn.call(move |conn| {
			let tx = conn.transaction()?;

			for order in &orders {
				tx.execute(
					"INSERT INTO orders (order_id, customer_id, order_date, status) VALUES (?, ?, ?, ?)",
					params![order.order_id, order.customer_id, order.order_date, order.status.as_str()]
				)?;
			}

			tx.commit()?;
			Ok(())
		}).await?;

		Ok(())
	}

	pub async fn insert_order_items(&self, items: Vec<OrderItem>) -> Result<()> {
		self.conn.call(move |conn| {
			let tx = conn.transaction()?;

			for item in &items {
				tx.execute(
					"INSERT INTO order_items (order_id, product_id, quantity, unit_price) VALUES (?, ?, ?, ?)",
					params![item.order_id, item.product_id, item.quantity, item.unit_price.to_string()]
				)?;
			}

			tx.commit()?;
			Ok(())
		}).await?;

		Ok(())
	}

	async fn fetch<R>(&self, report: Report) -> Result<Vec<R>> where R: FromSqliteRow + Send + 'static {
		debug!(report = %report, "Running report query");
		let sql = query_for(report);

		let rows = self.conn
			.call(move |conn| {
				let mut stmt = conn.prepare(sql)?;
				let rows = stmt
					.query_map([], |row| R::from_sqlite_row(row))?
					.collect::<Result<Vec<_>, _>>()?;
				Ok(rows)
			}).await?;

		Ok(rows)
	}
}

#[async_trait]
impl SalesAnalytics for SqliteAnalytics {
	fn database_name(&self) -> String {
		"SQLite".to_string()
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
