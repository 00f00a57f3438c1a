use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Result, db::Db, models::Listing};

pub struct ListingUpsert<'a> {
	pub listing_id: Uuid,
	pub provider: &'a str,
	pub natural_id: &'a str,
	pub title: &'a str,
	pub price: Option<i64>,
	pub content: Option<&'a str>,
	pub year: Option<i32>,
	pub mileage: Option<i64>,
	pub page_url: &'a str,
	pub images: Value,
}

/// Writes a listing and drops its `indexed` flag until the vector side catches up. A re-sync of a
/// soft-deleted listing revives the row; the `listing_id` of an existing row is never replaced.
pub async fn upsert_listing(db: &Db, row: &ListingUpsert<'_>) -> Result<Listing> {
	let listing = sqlx::query_as::<_, Listing>(
		"\
INSERT INTO listings (
	listing_id, provider, natural_id, title, price, content, year, mileage, page_url, images, indexed
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,FALSE)
ON CONFLICT (provider, natural_id) DO UPDATE SET
	title = EXCLUDED.title,
	price = EXCLUDED.price,
	content = EXCLUDED.content,
	year = EXCLUDED.year,
	mileage = EXCLUDED.mileage,
	page_url = EXCLUDED.page_url,
	images = EXCLUDED.images,
	indexed = FALSE,
	deleted_at = NULL,
	updated_at = now()
RETURNING
	listing_id, provider, natural_id, title, price, content, year, mileage, page_url, images,
	indexed, deleted_at, created_at, updated_at",
	)
	.bind(row.listing_id)
	.bind(row.provider)
	.bind(row.natural_id)
	.bind(row.title)
	.bind(row.price)
	.bind(row.content)
	.bind(row.year)
	.bind(row.mileage)
	.bind(row.page_url)
	.bind(&row.images)
	.fetch_one(&db.pool)
	.await?;

	Ok(listing)
}

pub async fn fetch_listing(db: &Db, provider: &str, natural_id: &str) -> Result<Option<Listing>> {
	let listing = sqlx::query_as::<_, Listing>(
		"\
SELECT
	listing_id, provider, natural_id, title, price, content, year, mileage, page_url, images,
	indexed, deleted_at, created_at, updated_at
FROM listings
WHERE provider = $1 AND natural_id = $2",
	)
	.bind(provider)
	.bind(natural_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(listing)
}

pub async fn mark_indexed(db: &Db, listing_id: Uuid, now: OffsetDateTime) -> Result<()> {
	sqlx::query(
		"UPDATE listings SET indexed = TRUE, updated_at = $1 WHERE listing_id = $2 AND deleted_at IS NULL",
	)
	.bind(now)
	.bind(listing_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

/// Returns `false` when no live row matched, which callers treat as an already-deleted listing.
pub async fn soft_delete_listing(
	db: &Db,
	provider: &str,
	natural_id: &str,
	now: OffsetDateTime,
) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE listings
SET deleted_at = $1,
	indexed = FALSE,
	updated_at = $1
WHERE provider = $2 AND natural_id = $3 AND deleted_at IS NULL",
	)
	.bind(now)
	.bind(provider)
	.bind(natural_id)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() > 0)
}
