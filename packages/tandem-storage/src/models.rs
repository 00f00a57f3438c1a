use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Listing {
	pub listing_id: Uuid,
	pub provider: String,
	pub natural_id: String,
	pub title: String,
	pub price: Option<i64>,
	pub content: Option<String>,
	pub year: Option<i32>,
	pub mileage: Option<i64>,
	pub page_url: String,
	pub images: Value,
	pub indexed: bool,
	pub deleted_at: Option<OffsetDateTime>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
impl Listing {
	pub fn is_active(&self) -> bool {
		self.deleted_at.is_none()
	}
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FailedOperation {
	pub failure_id: Uuid,
	pub operation_type: String,
	pub provider: String,
	pub product_id: String,
	pub error_message: String,
	pub error_details: Value,
	pub retry_count: i32,
	pub max_retries: i32,
	pub next_retry_at: OffsetDateTime,
	pub created_at: OffsetDateTime,
	pub last_attempted_at: OffsetDateTime,
	pub resolved_at: Option<OffsetDateTime>,
}
impl FailedOperation {
	/// Out of automatic retries; the row stays in the ledger for operator review.
	pub fn is_permanent(&self) -> bool {
		self.retry_count >= self.max_retries
	}
}
