use std::{sync::Arc, time::Duration as StdDuration};

use color_eyre::Result;
use time::{Duration, OffsetDateTime};
use tokio::time as tokio_time;

use tandem_domain::job::Job;
use tandem_queue::JobQueue;
use tandem_service::{Disposition, TandemService};

const HOUSEKEEPING_INTERVAL_SECONDS: i64 = 3_600;
const QUEUE_ERROR_BACKOFF_MS: u64 = 1_000;

/// Runs the consumer pool and the retry scheduler until the process is killed. Both sides log and
/// carry on through transient errors; nothing here is allowed to take the worker down short of a
/// panic.
pub async fn run_worker(service: TandemService, queue: JobQueue) -> Result<()> {
	let workers = service.cfg.consumer.workers;
	let default_provider = service.cfg.ingest.default_provider.clone();
	let scan_interval = StdDuration::from_secs(service.cfg.retry.scan_interval_secs);
	let service = Arc::new(service);
	let queue = Arc::new(queue);
	let mut handles = Vec::new();

	for worker_id in 0..workers {
		let service = service.clone();
		let queue = queue.clone();
		let default_provider = default_provider.clone();

		handles.push(tokio::spawn(async move {
			consume_loop(worker_id, service, queue, default_provider).await;
		}));
	}

	tracing::info!(workers, queue = %queue.queue_name(), "Consumers started.");

	handles.push(tokio::spawn(async move {
		scheduler_loop(service, scan_interval).await;
	}));

	for handle in handles {
		handle.await?;
	}

	Ok(())
}

async fn consume_loop(
	worker_id: usize,
	service: Arc<TandemService>,
	queue: Arc<JobQueue>,
	default_provider: String,
) {
	loop {
		let raw = match queue.pop().await {
			Ok(Some(raw)) => raw,
			Ok(None) => continue,
			Err(err) => {
				tracing::error!(worker_id, error = %err, "Queue pop failed.");
				tokio_time::sleep(StdDuration::from_millis(QUEUE_ERROR_BACKOFF_MS)).await;

				continue;
			},
		};
		// Malformed messages are dropped here; only well-formed jobs that fail to apply reach the
		// failure ledger.
		let job = match Job::decode(&raw, &default_provider) {
			Ok(job) => job,
			Err(err) => {
				tracing::warn!(worker_id, error = %err, "Dropping malformed job message.");

				continue;
			},
		};

		match service.process(&job).await {
			Ok(Disposition::Applied | Disposition::FailureRecorded { .. }) => {},
			Err(err) => {
				tracing::error!(
					worker_id,
					provider = %job.provider,
					product_id = %job.product_id,
					error = %err,
					"Job failed and the failure could not be recorded."
				);
			},
		}
	}
}

async fn scheduler_loop(service: Arc<TandemService>, scan_interval: StdDuration) {
	let mut last_purge = OffsetDateTime::now_utc();
	let mut ticker = tokio_time::interval(scan_interval);

	loop {
		ticker.tick().await;

		let now = OffsetDateTime::now_utc();

		match service.run_due_retries(now).await {
			Ok(report) if report.claimed > 0 => {
				tracing::info!(
					claimed = report.claimed,
					succeeded = report.succeeded,
					failed = report.failed,
					abandoned = report.abandoned,
					"Retry pass finished."
				);
			},
			Ok(_) => {},
			Err(err) => {
				tracing::error!(error = %err, "Retry pass failed.");
			},
		}

		if now - last_purge >= Duration::seconds(HOUSEKEEPING_INTERVAL_SECONDS) {
			match service.purge_resolved(now).await {
				Ok(purged) => {
					if purged > 0 {
						tracing::info!(purged, "Purged resolved failures past retention.");
					}

					last_purge = now;
				},
				Err(err) => {
					tracing::error!(error = %err, "Resolved failure purge failed.");
				},
			}
		}
	}
}
