use serde_json::Map;
use time::OffsetDateTime;
use uuid::Uuid;

use tandem_domain::job::{Job, JobKind, ProductPayload};
use tandem_storage::{
	ledger,
	listings,
	models::{FailedOperation, Listing},
};

use crate::{Disposition, Error, Result, TandemService};

#[derive(Debug, Default)]
pub struct RetryReport {
	pub claimed: usize,
	pub succeeded: usize,
	pub failed: usize,
	pub abandoned: usize,
}

impl TandemService {
	/// One scheduler pass: claim due failures and re-apply them. Claimed rows are leased, so
	/// overlapping passes (or a second worker) skip them.
	pub async fn run_due_retries(&self, now: OffsetDateTime) -> Result<RetryReport> {
		let claimed = ledger::claim_due_failures(
			&self.db,
			now,
			self.cfg.retry.claim_batch_size,
			self.cfg.consumer.processing_timeout_secs as i64,
		)
		.await?;

		self.retry_claimed(claimed, now).await
	}

	/// Operator-driven retries. Bypasses the schedule and the retry budget so permanently-failed
	/// rows can be re-attempted after the underlying cause is fixed.
	pub async fn retry_failures(&self, ids: &[Uuid], now: OffsetDateTime) -> Result<RetryReport> {
		let claimed = ledger::claim_failures_by_ids(
			&self.db,
			ids,
			now,
			self.cfg.consumer.processing_timeout_secs as i64,
		)
		.await?;

		self.retry_claimed(claimed, now).await
	}

	async fn retry_claimed(
		&self,
		rows: Vec<FailedOperation>,
		now: OffsetDateTime,
	) -> Result<RetryReport> {
		let mut report = RetryReport { claimed: rows.len(), ..RetryReport::default() };

		for row in rows {
			let Some(job) = self.reconstruct_job(&row).await? else {
				ledger::mark_permanently_failed(
					&self.db,
					row.failure_id,
					"Retry abandoned: the listing no longer exists and no job payload was captured.",
					now,
				)
				.await?;

				tracing::warn!(
					failure_id = %row.failure_id,
					provider = %row.provider,
					product_id = %row.product_id,
					"Retry abandoned; marked permanently failed."
				);

				report.abandoned += 1;

				continue;
			};

			match self.process(&job).await? {
				Disposition::Applied => {
					ledger::resolve_failure(&self.db, row.failure_id, now).await?;

					tracing::info!(
						failure_id = %row.failure_id,
						provider = %row.provider,
						product_id = %row.product_id,
						"Retry succeeded; failure resolved."
					);

					report.succeeded += 1;
				},
				Disposition::FailureRecorded { .. } => {
					report.failed += 1;
				},
			}
		}

		Ok(report)
	}

	/// Rebuilds the job for a ledger row: the live listing row is the preferred source, the job
	/// payload captured at failure time is the fallback. `None` means neither exists.
	async fn reconstruct_job(&self, row: &FailedOperation) -> Result<Option<Job>> {
		let kind = JobKind::parse(&row.operation_type).ok_or_else(|| Error::InvalidRequest {
			message: format!("Unknown operation type in ledger: {}.", row.operation_type),
		})?;

		if kind == JobKind::Delete {
			return Ok(Some(bare_job(kind, &row.provider, &row.product_id)));
		}

		if let Some(listing) = listings::fetch_listing(&self.db, &row.provider, &row.product_id).await?
			&& listing.is_active()
		{
			return Ok(Some(job_from_listing(kind, &listing)));
		}
		if let Some(captured) = row.error_details.get("job")
			&& let Ok(job) = serde_json::from_value::<Job>(captured.clone())
			&& job.payload.is_some()
		{
			return Ok(Some(job));
		}

		Ok(None)
	}
}

fn bare_job(kind: JobKind, provider: &str, product_id: &str) -> Job {
	Job {
		job_id: Uuid::new_v4(),
		kind,
		product_id: product_id.to_string(),
		provider: provider.to_string(),
		payload: None,
		timestamp: None,
		metadata: Map::new(),
	}
}

fn job_from_listing(kind: JobKind, listing: &Listing) -> Job {
	let images = serde_json::from_value(listing.images.clone()).unwrap_or_default();
	let payload = ProductPayload {
		pid: listing.natural_id.clone(),
		title: listing.title.clone(),
		price: listing.price,
		content: listing.content.clone(),
		year: listing.year,
		mileage: listing.mileage,
		page_url: listing.page_url.clone(),
		images,
	};
	let mut job = bare_job(kind, &listing.provider, &listing.natural_id);

	job.payload = Some(payload);

	job
}
