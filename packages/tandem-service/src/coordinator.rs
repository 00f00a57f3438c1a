use std::{collections::HashMap, time::Duration};

use qdrant_client::{client::Payload, qdrant::Value};
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use tandem_domain::{
	identity,
	job::{Job, JobKind},
	text,
};
use tandem_storage::{
	ledger::{self, FailureReport},
	listings::{self, ListingUpsert},
	qdrant::{PAYLOAD_PAGE_URL, PAYLOAD_PRODUCT_ID, PAYLOAD_PROVIDER, PAYLOAD_SCHEME_ID, PAYLOAD_TITLE},
};

use crate::{Error, Result, TandemService};

const MAX_ERROR_TEXT_CHARS: usize = 2_000;

/// What became of a job. A recorded failure is a handled outcome, not an error; the message is
/// consumed either way and the ledger owns the follow-up.
#[derive(Debug)]
pub enum Disposition {
	Applied,
	FailureRecorded { failure_id: Uuid, retry_count: i32, permanent: bool },
}

impl TandemService {
	/// Applies one job under the per-listing lock and a processing deadline. Any failure is
	/// written to the failure ledger with enough context to retry later.
	pub async fn process(&self, job: &Job) -> Result<Disposition> {
		let _guard = self.locks.lock(&job.provider, &job.product_id).await;
		let deadline = Duration::from_secs(self.cfg.consumer.processing_timeout_secs);
		let err = match tokio::time::timeout(deadline, self.apply_leased(job)).await {
			Ok(Ok(())) => return Ok(Disposition::Applied),
			Ok(Err(err)) => err,
			Err(_) => Error::Timeout { secs: self.cfg.consumer.processing_timeout_secs },
		};
		let message = sanitize_error_text(&err.to_string());
		let report = FailureReport {
			operation_type: job.kind.as_str(),
			provider: &job.provider,
			product_id: &job.product_id,
			error_message: &message,
			// The raw job rides along so a retry can be reconstructed even when the listing row
			// never landed.
			error_details: json!({ "job": job }),
		};
		let row = ledger::record_failure(
			&self.db,
			&report,
			self.cfg.retry.max_retries,
			self.cfg.retry.base_delay_secs,
			self.cfg.retry.max_delay_secs,
			OffsetDateTime::now_utc(),
		)
		.await?;

		tracing::warn!(
			provider = %job.provider,
			product_id = %job.product_id,
			kind = %job.kind.as_str(),
			retry_count = row.retry_count,
			permanent = row.is_permanent(),
			error = %message,
			"Job failed; recorded in the failure ledger."
		);

		Ok(Disposition::FailureRecorded {
			failure_id: row.failure_id,
			retry_count: row.retry_count,
			permanent: row.is_permanent(),
		})
	}

	/// Extends the per-key lock across processes. The worker and the API both drive this
	/// coordinator from their own process, so the in-process lock map alone cannot serialize a
	/// queue-driven job against an operator retry for the same listing. Waiting on a contended
	/// lease counts against the processing deadline; a timed-out or failed attempt drops the
	/// lease transaction, which releases the lock.
	async fn apply_leased(&self, job: &Job) -> Result<()> {
		let lease =
			self.db.acquire_key_lease(lease_key(&job.provider, &job.product_id)).await?;
		let result = self.apply(job).await;

		if result.is_ok() {
			lease.release().await?;
		}

		result
	}

	async fn apply(&self, job: &Job) -> Result<()> {
		match job.kind {
			// An update with no existing row degrades to a plain sync, so both kinds share the
			// upsert path.
			JobKind::Sync | JobKind::Update => self.apply_upsert(job).await,
			JobKind::Delete => self.apply_delete(job).await,
		}
	}

	/// Relational row first, vector point second. The `indexed` flag only rises after the waited
	/// Qdrant upsert, so a crash between the two leaves a visibly unindexed row instead of a
	/// silent divergence.
	async fn apply_upsert(&self, job: &Job) -> Result<()> {
		let payload = job.payload.as_ref().ok_or_else(|| Error::InvalidRequest {
			message: "Sync and update jobs require product data.".to_string(),
		})?;
		let listing_id = identity::point_id(&job.provider, &job.product_id);
		let row = ListingUpsert {
			listing_id,
			provider: &job.provider,
			natural_id: &job.product_id,
			title: &payload.title,
			price: payload.price,
			content: payload.content.as_deref(),
			year: payload.year,
			mileage: payload.mileage,
			page_url: &payload.page_url,
			images: serde_json::to_value(&payload.images)?,
		};
		let listing = listings::upsert_listing(&self.db, &row).await?;
		let embedding_input = text::embedding_text(payload);
		let embeddings = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, &[embedding_input])
			.await?;
		let Some(vector) = embeddings.into_iter().next() else {
			return Err(Error::Provider {
				message: "Embedding provider returned no vectors.".to_string(),
			});
		};

		if vector.len() != self.cfg.storage.qdrant.vector_dim as usize {
			return Err(Error::Provider {
				message: "Embedding vector dimension mismatch.".to_string(),
			});
		}

		self.qdrant.upsert_point(listing.listing_id, vector, point_payload(job, payload)).await?;
		listings::mark_indexed(&self.db, listing.listing_id, OffsetDateTime::now_utc()).await?;

		tracing::info!(
			provider = %job.provider,
			product_id = %job.product_id,
			listing_id = %listing.listing_id,
			kind = %job.kind.as_str(),
			"Listing synced across both stores."
		);

		Ok(())
	}

	/// Vector point first, relational soft-delete second. Both halves tolerate an already-absent
	/// target so a replayed delete converges instead of failing.
	async fn apply_delete(&self, job: &Job) -> Result<()> {
		let point_id = identity::point_id(&job.provider, &job.product_id);
		let point_existed = self.qdrant.delete_point(point_id).await?;

		if !point_existed {
			tracing::info!(
				provider = %job.provider,
				product_id = %job.product_id,
				"Qdrant point missing during delete."
			);
		}

		let row_existed = listings::soft_delete_listing(
			&self.db,
			&job.provider,
			&job.product_id,
			OffsetDateTime::now_utc(),
		)
		.await?;

		if !row_existed {
			tracing::info!(
				provider = %job.provider,
				product_id = %job.product_id,
				"Listing already absent during delete."
			);
		}

		Ok(())
	}
}

/// Advisory-lock key for a listing, folded from the deterministic point id so every process
/// derives the same key for the same `(provider, natural_id)`.
fn lease_key(provider: &str, natural_id: &str) -> i64 {
	let bytes = identity::point_id(provider, natural_id).into_bytes();
	let mut head = [0_u8; 8];

	head.copy_from_slice(&bytes[..8]);

	i64::from_be_bytes(head)
}

fn point_payload(job: &Job, payload: &tandem_domain::job::ProductPayload) -> Payload {
	let mut map = HashMap::new();

	map.insert(PAYLOAD_PROVIDER.to_string(), Value::from(job.provider.clone()));
	map.insert(PAYLOAD_PRODUCT_ID.to_string(), Value::from(job.product_id.clone()));
	map.insert(PAYLOAD_TITLE.to_string(), Value::from(payload.title.clone()));
	map.insert(PAYLOAD_PAGE_URL.to_string(), Value::from(payload.page_url.clone()));
	map.insert(PAYLOAD_SCHEME_ID.to_string(), Value::from(identity::SCHEME_ID.to_string()));

	Payload::from(map)
}

/// Error text lands in the ledger and the status API, so secrets are scrubbed and the text is
/// bounded before it is stored.
pub(crate) fn sanitize_error_text(text: &str) -> String {
	let mut parts = Vec::new();
	let mut redact_next = false;

	for raw in text.split_whitespace() {
		let mut word = raw.to_string();

		if redact_next {
			word = "[REDACTED]".to_string();
			redact_next = false;
		}
		if raw.eq_ignore_ascii_case("bearer") {
			redact_next = true;
		}

		let lowered = raw.to_ascii_lowercase();

		for key in ["api_key", "apikey", "password", "secret", "token"] {
			if lowered.contains(key) && (lowered.contains('=') || lowered.contains(':')) {
				let sep = if raw.contains('=') { '=' } else { ':' };
				let prefix = match raw.split(sep).next() {
					Some(prefix) => prefix,
					None => raw,
				};

				word = format!("{prefix}{sep}[REDACTED]");

				break;
			}
		}

		parts.push(word);
	}

	let joined = parts.join(" ");

	if joined.chars().count() <= MAX_ERROR_TEXT_CHARS {
		return joined;
	}

	joined.chars().take(MAX_ERROR_TEXT_CHARS).collect()
}
