use chrono::{ Duration, NaiveDate };
use common::models::{ Customer, Order, OrderItem, OrderStatus, Product };
use rand::{ seq::SliceRandom, Rng };
use rust_decimal::Decimal;

const COUNTRIES: [&str; 6] = ["USA", "Germany", "France", "Japan", "Brazil", "Canada"];
const CATEGORIES: [&str; 5] = ["Electronics", "Books", "Clothing", "Home", "Toys"];
const STATUSES: [OrderStatus; 5] = [
	OrderStatus::Pending,
	OrderStatus::Processing,
	OrderStatus::Shipped,
	OrderStatus::Delivered,
	OrderStatus::Cancelled,
];

/// A random but internally consistent shop.
///
/// Roughly one product in five is never ordered, and order statuses are
/// mixed, so every report has something to show.
#[derive(Debug, Default)]
pub struct SampleData {
	pub customers: Vec<Customer>,
	pub products: Vec<Product>,
	pub orders: Vec<Order>,
	pub order_items: Vec<OrderItem>,
}

impl SampleData {
	pub fn generate(customer_count: usize) -> Self {
		let mut rng = rand::thread_rng();
		let mut data = SampleData::default();

		let product_count = customer_count.max(5);
		// Only the first 80% of the catalogue ever gets ordered.
		let orderable = (product_count * 4 / 5).max(1);

		for id in 1..=product_count as i64 {
			data.products.push(generate_random_product(&mut rng, id));
		}

		let first_day = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default();
		let mut order_id = 0_i64;

		for id in 1..=customer_count as i64 {
			data.customers.push(generate_random_customer(&mut rng, id));

			for _ in 0..rng.gen_range(0..=3) {
				order_id += 1;
				data.orders.push(Order {
					order_id,
					customer_id: id,
					order_date: first_day + Duration::days(rng.gen_range(0..730)),
					status: STATUSES.choose(&mut rng).cloned().unwrap_or(OrderStatus::Pending),
				});

				for _ in 0..rng.gen_range(1..=4) {
					let product = &data.products[rng.gen_range(0..orderable)];
					data.order_items.push(OrderItem {
						order_id,
						product_id: product.product_id,
						quantity: rng.gen_range(1..=5),
						unit_price: product.price,
					});
				}
			}
		}

		data
	}
}

fn generate_random_customer<R: Rng>(rng: &mut R, customer_id: i64) -> Customer {
	let suffix = rng.gen_range(1000..9999);

	Customer {
		customer_id,
		name: format!("Customer {}", suffix),
		email: format!("customer{}.{}@example.com", customer_id, suffix),
		country: COUNTRIES.choose(rng).unwrap_or(&COUNTRIES[0]).to_string(),
	}
}

fn generate_random_product<R: Rng>(rng: &mut R, product_id: i64) -> Product {
	Product {
		product_id,
		name: format!("Product {}", rng.gen_range(1000..9999)),
		category: CATEGORIES.choose(rng).unwrap_or(&CATEGORIES[0]).to_string(),
		price: Decimal::new(rng.gen_range(199..50_000), 2),
	}
}
