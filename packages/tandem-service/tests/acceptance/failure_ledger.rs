use time::{Duration, OffsetDateTime};

use tandem_storage::listings;

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set TANDEM_PG_DSN and TANDEM_QDRANT_URL to run."]
async fn repeated_failures_fold_and_an_operator_retry_resolves() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping repeated_failures_fold_and_an_operator_retry_resolves; set TANDEM_PG_DSN.");

		return;
	};
	let Some(qdrant_url) = super::test_qdrant_url() else {
		eprintln!(
			"Skipping repeated_failures_fold_and_an_operator_retry_resolves; set TANDEM_QDRANT_URL."
		);

		return;
	};
	let collection = test_db.collection_name("tandem_acceptance");
	let dsn = test_db.dsn().to_string();
	let failing = super::build_service(
		super::test_config(dsn.clone(), qdrant_url.clone(), collection.clone()),
		super::failing_providers(),
	)
	.await;
	let job = super::sync_job("P1");
	let (first_id, first_count, first_permanent) =
		super::expect_failure_recorded(&failing, &job).await;

	assert_eq!(first_count, 0);
	assert!(!first_permanent);

	let (second_id, second_count, _) = super::expect_failure_recorded(&failing, &job).await;

	assert_eq!(second_id, first_id, "A repeat failure must fold into the unresolved row.");
	assert_eq!(second_count, 1);

	let status = failing.ledger_status().await.expect("Failed to read ledger status.");

	assert_eq!(status.unresolved_failures, 1);
	assert_eq!(status.failures_by_type.get("sync"), Some(&1));

	// The listing row landed before the embedding failed, so it is visible but unindexed.
	let listing = listings::fetch_listing(&failing.db, "bunjang", "P1")
		.await
		.expect("Failed to fetch listing.")
		.expect("Expected the relational half of the failed sync.");

	assert!(!listing.indexed);

	// With the backend healthy again, an operator retry by id resolves the row.
	let healthy = super::build_service(
		super::test_config(dsn, qdrant_url, collection),
		super::stub_providers(),
	)
	.await;
	let report = healthy
		.retry_failures(&[first_id], OffsetDateTime::now_utc())
		.await
		.expect("Failed to retry failures.");

	assert_eq!(report.claimed, 1);
	assert_eq!(report.succeeded, 1);

	let status = healthy.ledger_status().await.expect("Failed to read ledger status.");

	assert_eq!(status.unresolved_failures, 0);

	let listing = listings::fetch_listing(&healthy.db, "bunjang", "P1")
		.await
		.expect("Failed to re-fetch listing.")
		.expect("Expected the listing row after the retry.");

	assert!(listing.indexed);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set TANDEM_PG_DSN and TANDEM_QDRANT_URL to run."]
async fn scheduler_pass_picks_up_due_failures() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping scheduler_pass_picks_up_due_failures; set TANDEM_PG_DSN.");

		return;
	};
	let Some(qdrant_url) = super::test_qdrant_url() else {
		eprintln!("Skipping scheduler_pass_picks_up_due_failures; set TANDEM_QDRANT_URL.");

		return;
	};
	let collection = test_db.collection_name("tandem_acceptance");
	let dsn = test_db.dsn().to_string();
	let failing = super::build_service(
		super::test_config(dsn.clone(), qdrant_url.clone(), collection.clone()),
		super::failing_providers(),
	)
	.await;

	super::expect_failure_recorded(&failing, &super::sync_job("P1")).await;

	let healthy = super::build_service(
		super::test_config(dsn, qdrant_url, collection),
		super::stub_providers(),
	)
	.await;

	// Nothing is due yet; the first retry only becomes due after the base delay.
	let early = healthy
		.run_due_retries(OffsetDateTime::now_utc())
		.await
		.expect("Failed to run the retry pass.");

	assert_eq!(early.claimed, 0);

	let later = OffsetDateTime::now_utc() + Duration::minutes(5);
	let report = healthy.run_due_retries(later).await.expect("Failed to run the retry pass.");

	assert_eq!(report.claimed, 1);
	assert_eq!(report.succeeded, 1);

	let status = healthy.ledger_status().await.expect("Failed to read ledger status.");

	assert_eq!(status.unresolved_failures, 0);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set TANDEM_PG_DSN and TANDEM_QDRANT_URL to run."]
async fn exhausted_rows_leave_the_schedule_but_stay_retriable_by_id() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping exhausted_rows_leave_the_schedule_but_stay_retriable_by_id; set TANDEM_PG_DSN."
		);

		return;
	};
	let Some(qdrant_url) = super::test_qdrant_url() else {
		eprintln!(
			"Skipping exhausted_rows_leave_the_schedule_but_stay_retriable_by_id; set TANDEM_QDRANT_URL."
		);

		return;
	};
	let collection = test_db.collection_name("tandem_acceptance");
	let dsn = test_db.dsn().to_string();
	let failing = super::build_service(
		super::test_config(dsn.clone(), qdrant_url.clone(), collection.clone()),
		super::failing_providers(),
	)
	.await;
	let job = super::sync_job("P1");
	let mut last = super::expect_failure_recorded(&failing, &job).await;

	for _ in 0..3 {
		last = super::expect_failure_recorded(&failing, &job).await;
	}

	let (failure_id, retry_count, permanent) = last;

	assert_eq!(retry_count, 3, "The retry count must saturate at max_retries.");
	assert!(permanent);

	let healthy = super::build_service(
		super::test_config(dsn, qdrant_url, collection),
		super::stub_providers(),
	)
	.await;
	let later = OffsetDateTime::now_utc() + Duration::hours(2);
	let scheduled = healthy.run_due_retries(later).await.expect("Failed to run the retry pass.");

	assert_eq!(scheduled.claimed, 0, "Exhausted rows must not be claimed by the scheduler.");

	let by_id = healthy
		.retry_failures(&[failure_id], OffsetDateTime::now_utc())
		.await
		.expect("Failed to retry by id.");

	assert_eq!(by_id.succeeded, 1, "Operator retries must bypass the retry budget.");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
