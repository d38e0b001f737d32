use std::fmt;
use async_trait::async_trait;
use anyhow::Result;

use crate::models::{
	CountryAverageOrderValue,
	CustomerTotalSpent,
	MonthlySales,
	NeverOrderedProduct,
	RepeatCustomer,
};

/// The fixed reports served by the API, one per endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Report {
	CustomerTotalSpent,
	MonthlySales,
	NeverOrderedProducts,
	AvgOrderValueByCountry,
	RepeatCustomers,
}

impl Report {
	pub const ALL: [Report; 5] = [
		Report::CustomerTotalSpent,
		Report::MonthlySales,
		Report::NeverOrderedProducts,
		Report::AvgOrderValueByCountry,
		Report::RepeatCustomers,
	];

	/// Route the report is served on.
	pub fn path(self) -> &'static str {
		match self {
			Report::CustomerTotalSpent => "/api/customers/total-spent",
			Report::MonthlySales => "/api/orders/monthly-sales",
			Report::NeverOrderedProducts => "/api/products/never-ordered",
			Report::AvgOrderValueByCountry => "/api/orders/avg-by-country",
			Report::RepeatCustomers => "/api/customers/repeat",
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			Report::CustomerTotalSpent => "customer total spent",
			Report::MonthlySales => "monthly sales",
			Report::NeverOrderedProducts => "never ordered products",
			Report::AvgOrderValueByCountry => "average order value by country",
			Report::RepeatCustomers => "repeat customers",
		}
	}
}

impl fmt::Display for Report {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// A read-only store able to answer every report.
///
/// Each method runs exactly one statement and returns the full result set,
/// or an error and no rows.
#[async_trait]
pub trait SalesAnalytics {
	/// Database name, used in logs
	fn database_name(&self) -> String;

	/// Sum of line totals per customer, largest first.
	/// Customers without orders are absent.
	async fn customer_total_spent(&self) -> Result<Vec<CustomerTotalSpent>>;

	/// Sum of line totals per (year, month) for shipped and delivered
	/// orders, most recent month first.
	async fn monthly_sales(&self) -> Result<Vec<MonthlySales>>;

	/// Products no order item references.
	async fn never_ordered_products(&self) -> Result<Vec<NeverOrderedProduct>>;

	/// Average of per-order totals grouped by the customer's country,
	/// highest average first.
	async fn avg_order_value_by_country(&self) -> Result<Vec<CountryAverageOrderValue>>;

	/// Customers with more than one order, most orders first.
	async fn repeat_customers(&self) -> Result<Vec<RepeatCustomer>>;
}
