use serde_json::Value;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{Error, Result, db::Db, models::FailedOperation};

/// Exponent cap keeps the shift well inside `i64` even with absurd retry counts.
const MAX_BACKOFF_EXPONENT: i32 = 6;

pub struct FailureReport<'a> {
	pub operation_type: &'a str,
	pub provider: &'a str,
	pub product_id: &'a str,
	pub error_message: &'a str,
	pub error_details: Value,
}

#[derive(Debug)]
pub struct LedgerCounts {
	pub unresolved: i64,
	pub permanent: i64,
	pub by_type: Vec<(String, i64)>,
}

/// Delay before the retry after `retry_count` recorded failures: base doubled per failure, capped.
/// Mirrors the SQL expression in [`record_failure`].
pub fn backoff_delay(retry_count: i32, base_secs: i64, max_secs: i64) -> Duration {
	let exp = retry_count.clamp(0, MAX_BACKOFF_EXPONENT) as u32;
	let secs = base_secs.saturating_mul(1_i64 << exp).min(max_secs);

	Duration::seconds(secs)
}

/// Records a failed operation, folding repeats into the existing unresolved row for the same
/// (operation_type, provider, product_id) key. A repeat bumps `retry_count` (saturating at
/// `max_retries`) and pushes `next_retry_at` out on the doubling schedule.
pub async fn record_failure(
	db: &Db,
	report: &FailureReport<'_>,
	max_retries: i32,
	base_delay_secs: i64,
	max_delay_secs: i64,
	now: OffsetDateTime,
) -> Result<FailedOperation> {
	let row = sqlx::query_as::<_, FailedOperation>(
		"\
INSERT INTO failed_operations (
	failure_id, operation_type, provider, product_id, error_message, error_details,
	retry_count, max_retries, next_retry_at, created_at, last_attempted_at
)
VALUES ($1,$2,$3,$4,$5,$6,0,$7,$8 + make_interval(secs => $9),$8,$8)
ON CONFLICT (operation_type, provider, product_id) WHERE resolved_at IS NULL
DO UPDATE SET
	retry_count = LEAST(failed_operations.retry_count + 1, failed_operations.max_retries),
	error_message = EXCLUDED.error_message,
	error_details = EXCLUDED.error_details,
	last_attempted_at = $8,
	next_retry_at = $8 + make_interval(
		secs => LEAST($9 * power(2, LEAST(failed_operations.retry_count + 1, $11)), $10)
	)
RETURNING
	failure_id, operation_type, provider, product_id, error_message, error_details,
	retry_count, max_retries, next_retry_at, created_at, last_attempted_at, resolved_at",
	)
	.bind(Uuid::new_v4())
	.bind(report.operation_type)
	.bind(report.provider)
	.bind(report.product_id)
	.bind(report.error_message)
	.bind(&report.error_details)
	.bind(max_retries)
	.bind(now)
	.bind(base_delay_secs as f64)
	.bind(max_delay_secs as f64)
	.bind(MAX_BACKOFF_EXPONENT)
	.fetch_one(&db.pool)
	.await?;

	Ok(row)
}

/// Claims due, retryable failures. Claimed rows get their `next_retry_at` pushed to the lease
/// horizon so a concurrent scan does not pick them up again while they are being retried.
pub async fn claim_due_failures(
	db: &Db,
	now: OffsetDateTime,
	limit: i64,
	lease_secs: i64,
) -> Result<Vec<FailedOperation>> {
	let mut tx = db.pool.begin().await?;
	let mut rows = sqlx::query_as::<_, FailedOperation>(
		"\
SELECT
	failure_id, operation_type, provider, product_id, error_message, error_details,
	retry_count, max_retries, next_retry_at, created_at, last_attempted_at, resolved_at
FROM failed_operations
WHERE resolved_at IS NULL AND retry_count < max_retries AND next_retry_at <= $1
ORDER BY next_retry_at ASC
LIMIT $2
FOR UPDATE SKIP LOCKED",
	)
	.bind(now)
	.bind(limit)
	.fetch_all(&mut *tx)
	.await?;

	if !rows.is_empty() {
		let lease_until = now + Duration::seconds(lease_secs);
		let ids: Vec<Uuid> = rows.iter().map(|row| row.failure_id).collect();

		sqlx::query(
			"UPDATE failed_operations SET last_attempted_at = $1, next_retry_at = $2 WHERE failure_id = ANY($3)",
		)
		.bind(now)
		.bind(lease_until)
		.bind(&ids)
		.execute(&mut *tx)
		.await?;

		for row in &mut rows {
			row.last_attempted_at = now;
			row.next_retry_at = lease_until;
		}
	}

	tx.commit().await?;

	Ok(rows)
}

/// Claims specific unresolved failures regardless of schedule or retry budget. Operator-driven
/// retries go through here so even permanently-failed rows can be re-attempted.
pub async fn claim_failures_by_ids(
	db: &Db,
	ids: &[Uuid],
	now: OffsetDateTime,
	lease_secs: i64,
) -> Result<Vec<FailedOperation>> {
	if ids.is_empty() {
		return Ok(Vec::new());
	}

	let mut tx = db.pool.begin().await?;
	let mut rows = sqlx::query_as::<_, FailedOperation>(
		"\
SELECT
	failure_id, operation_type, provider, product_id, error_message, error_details,
	retry_count, max_retries, next_retry_at, created_at, last_attempted_at, resolved_at
FROM failed_operations
WHERE failure_id = ANY($1) AND resolved_at IS NULL
ORDER BY created_at ASC
FOR UPDATE SKIP LOCKED",
	)
	.bind(ids)
	.fetch_all(&mut *tx)
	.await?;

	if rows.is_empty() {
		// Distinguish "every requested row is mid-retry elsewhere" from ids that match nothing
		// unresolved, so an operator typo surfaces instead of reporting an empty pass.
		let (matched,): (i64,) = sqlx::query_as(
			"SELECT COUNT(*) FROM failed_operations WHERE failure_id = ANY($1) AND resolved_at IS NULL",
		)
		.bind(ids)
		.fetch_one(&mut *tx)
		.await?;

		tx.commit().await?;

		if matched == 0 {
			return Err(Error::NotFound(
				"No unresolved failures match the requested operation ids.".to_string(),
			));
		}

		return Ok(rows);
	}

	let lease_until = now + Duration::seconds(lease_secs);
	let claimed: Vec<Uuid> = rows.iter().map(|row| row.failure_id).collect();

	sqlx::query(
		"UPDATE failed_operations SET last_attempted_at = $1, next_retry_at = $2 WHERE failure_id = ANY($3)",
	)
	.bind(now)
	.bind(lease_until)
	.bind(&claimed)
	.execute(&mut *tx)
	.await?;

	for row in &mut rows {
		row.last_attempted_at = now;
		row.next_retry_at = lease_until;
	}

	tx.commit().await?;

	Ok(rows)
}

pub async fn resolve_failure(db: &Db, failure_id: Uuid, now: OffsetDateTime) -> Result<()> {
	sqlx::query(
		"UPDATE failed_operations SET resolved_at = $1, last_attempted_at = $1 WHERE failure_id = $2 AND resolved_at IS NULL",
	)
	.bind(now)
	.bind(failure_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

/// Exhausts the retry budget in place. Used when a retry can no longer be reconstructed, e.g. the
/// listing vanished from the store of record and no payload was captured.
pub async fn mark_permanently_failed(
	db: &Db,
	failure_id: Uuid,
	reason: &str,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
UPDATE failed_operations
SET retry_count = max_retries,
	error_message = $1,
	last_attempted_at = $2
WHERE failure_id = $3 AND resolved_at IS NULL",
	)
	.bind(reason)
	.bind(now)
	.bind(failure_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn unresolved_counts(db: &Db) -> Result<LedgerCounts> {
	let (unresolved, permanent) = sqlx::query_as::<_, (i64, i64)>(
		"\
SELECT
	COUNT(*),
	COUNT(*) FILTER (WHERE retry_count >= max_retries)
FROM failed_operations
WHERE resolved_at IS NULL",
	)
	.fetch_one(&db.pool)
	.await?;
	let by_type = sqlx::query_as::<_, (String, i64)>(
		"\
SELECT operation_type, COUNT(*)
FROM failed_operations
WHERE resolved_at IS NULL
GROUP BY operation_type
ORDER BY operation_type",
	)
	.fetch_all(&db.pool)
	.await?;

	Ok(LedgerCounts { unresolved, permanent, by_type })
}

pub async fn list_unresolved_failures(
	db: &Db,
	limit: i64,
	offset: i64,
) -> Result<Vec<FailedOperation>> {
	let rows = sqlx::query_as::<_, FailedOperation>(
		"\
SELECT
	failure_id, operation_type, provider, product_id, error_message, error_details,
	retry_count, max_retries, next_retry_at, created_at, last_attempted_at, resolved_at
FROM failed_operations
WHERE resolved_at IS NULL
ORDER BY created_at DESC
LIMIT $1 OFFSET $2",
	)
	.bind(limit)
	.bind(offset)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn purge_resolved_failures(
	db: &Db,
	now: OffsetDateTime,
	retention_days: i64,
) -> Result<u64> {
	let result = sqlx::query(
		"DELETE FROM failed_operations WHERE resolved_at IS NOT NULL AND resolved_at < $1 - make_interval(days => $2)",
	)
	.bind(now)
	.bind(retention_days as i32)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected())
}
