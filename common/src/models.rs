use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{ Deserialize, Serialize };

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
	pub customer_id: i64,
	pub name: String,
	pub email: String,
	pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
	pub product_id: i64,
	pub name: String,
	pub category: String,
	#[serde(with = "rust_decimal::serde::float")]
	pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	pub order_id: i64,
	pub customer_id: i64,
	pub order_date: NaiveDate,
	pub status: OrderStatus,
}

/// One product line within an order, priced at the time of sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
	pub order_id: i64,
	pub product_id: i64,
	pub quantity: i64,
	#[serde(with = "rust_decimal::serde::float")]
	pub unit_price: Decimal,
}

/// Order status as stored in `orders.status`.
///
/// Unknown values are kept verbatim in `Other`, the database is free to
/// carry statuses this service never matches on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
	Pending,
	Processing,
	Shipped,
	Delivered,
	Cancelled,
	Other(String),
}

impl OrderStatus {
	/// Statuses counted as realised sales by the monthly sales report.
	pub const SALES: [OrderStatus; 2] = [OrderStatus::Shipped, OrderStatus::Delivered];

	pub fn as_str(&self) -> &str {
		match self {
			OrderStatus::Pending => "Pending",
			OrderStatus::Processing => "Processing",
			OrderStatus::Shipped => "Shipped",
			OrderStatus::Delivered => "Delivered",
			OrderStatus::Cancelled => "Cancelled",
			OrderStatus::Other(status) => status,
		}
	}
}

impl From<&str> for OrderStatus {
	fn from(status: &str) -> Self {
		match status {
			"Pending" => OrderStatus::Pending,
			"Processing" => OrderStatus::Processing,
			"Shipped" => OrderStatus::Shipped,
			"Delivered" => OrderStatus::Delivered,
			"Cancelled" => OrderStatus::Cancelled,
			other => OrderStatus::Other(other.to_string()),
		}
	}
}

impl From<String> for OrderStatus {
	fn from(status: String) -> Self {
		OrderStatus::from(status.as_str())
	}
}

impl From<OrderStatus> for String {
	fn from(status: OrderStatus) -> Self {
		status.as_str().to_string()
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

// Report rows. Field names are the column aliases of the catalog queries and
// appear unchanged in the JSON responses. Descriptive columns come from a
// schema this service does not own and may be NULL, which serializes as null.

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerTotalSpent {
	pub customer_id: i64,
	pub name: Option<String>,
	pub email: Option<String>,
	#[serde(with = "rust_decimal::serde::float")]
	pub total_spent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySales {
	pub year: Option<i64>,
	pub month: Option<i64>,
	#[serde(with = "rust_decimal::serde::float")]
	pub total_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeverOrderedProduct {
	pub product_id: i64,
	pub name: Option<String>,
	pub category: Option<String>,
	#[serde(with = "rust_decimal::serde::float_option")]
	pub price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryAverageOrderValue {
	pub country: Option<String>,
	#[serde(with = "rust_decimal::serde::float")]
	pub avg_order_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepeatCustomer {
	pub customer_id: i64,
	pub name: Option<String>,
	pub email: Option<String>,
	pub order_count: i64,
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn report_rows_serialize_amounts_as_numbers() {
		let row = CustomerTotalSpent {
			customer_id: 7,
			name: Some("Ada".to_string()),
			email: Some("ada@example.com".to_string()),
			total_spent: Decimal::new(12_550, 2),
		};

		let value = serde_json::to_value(&row).unwrap();
		assert_eq!(
			value,
			json!({
				"customer_id": 7,
				"name": "Ada",
				"email": "ada@example.com",
				"total_spent": 125.5,
			})
		);
	}

	#[test]
	fn monthly_sales_field_names() {
		let row = MonthlySales { year: Some(2024), month: Some(3), total_price: Decimal::new(300, 0) };
		let value = serde_json::to_value(&row).unwrap();
		assert_eq!(value, json!({ "year": 2024, "month": 3, "total_price": 300.0 }));
	}

	#[test]
	fn order_status_round_trips_unknown_values() {
		assert_eq!(OrderStatus::from("Shipped"), OrderStatus::Shipped);
		assert_eq!(OrderStatus::from("Returned"), OrderStatus::Other("Returned".to_string()));
		assert_eq!(OrderStatus::from("Returned").to_string(), "Returned");

		let status: OrderStatus = serde_json::from_str("\"Delivered\"").unwrap();
		assert_eq!(status, OrderStatus::Delivered);
		assert_eq!(serde_json::to_string(&OrderStatus::Pending).unwrap(), "\"Pending\"");
	}

	#[test]
	fn null_descriptive_columns_serialize_as_null() {
		let product = NeverOrderedProduct {
			product_id: 4,
			name: Some("Lamp".to_string()),
			category: None,
			price: None,
		};
		assert_eq!(
			serde_json::to_value(&product).unwrap(),
			json!({ "product_id": 4, "name": "Lamp", "category": null, "price": null })
		);

		let country = CountryAverageOrderValue { country: None, avg_order_value: Decimal::new(200, 0) };
		assert_eq!(
			serde_json::to_value(&country).unwrap(),
			json!({ "country": null, "avg_order_value": 200.0 })
		);
	}
}
