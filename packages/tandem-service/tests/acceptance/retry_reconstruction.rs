use time::OffsetDateTime;

use tandem_storage::listings;

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set TANDEM_PG_DSN and TANDEM_QDRANT_URL to run."]
async fn retry_falls_back_to_the_captured_payload() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping retry_falls_back_to_the_captured_payload; set TANDEM_PG_DSN.");

		return;
	};
	let Some(qdrant_url) = super::test_qdrant_url() else {
		eprintln!("Skipping retry_falls_back_to_the_captured_payload; set TANDEM_QDRANT_URL.");

		return;
	};
	let collection = test_db.collection_name("tandem_acceptance");
	let dsn = test_db.dsn().to_string();
	let failing = super::build_service(
		super::test_config(dsn.clone(), qdrant_url.clone(), collection.clone()),
		super::failing_providers(),
	)
	.await;
	let (failure_id, ..) = super::expect_failure_recorded(&failing, &super::sync_job("P1")).await;

	// Simulate the relational half never having landed.
	sqlx::query("DELETE FROM listings WHERE provider = $1 AND natural_id = $2")
		.bind("bunjang")
		.bind("P1")
		.execute(&failing.db.pool)
		.await
		.expect("Failed to drop the listing row.");

	let healthy = super::build_service(
		super::test_config(dsn, qdrant_url, collection),
		super::stub_providers(),
	)
	.await;
	let report = healthy
		.retry_failures(&[failure_id], OffsetDateTime::now_utc())
		.await
		.expect("Failed to retry failures.");

	assert_eq!(report.succeeded, 1, "The captured job payload must be enough to retry.");

	let listing = listings::fetch_listing(&healthy.db, "bunjang", "P1")
		.await
		.expect("Failed to fetch listing.")
		.expect("The retry must recreate the listing row.");

	assert!(listing.indexed);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set TANDEM_PG_DSN and TANDEM_QDRANT_URL to run."]
async fn retry_is_abandoned_when_nothing_is_left_to_rebuild_from() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping retry_is_abandoned_when_nothing_is_left_to_rebuild_from; set TANDEM_PG_DSN.");

		return;
	};
	let Some(qdrant_url) = super::test_qdrant_url() else {
		eprintln!(
			"Skipping retry_is_abandoned_when_nothing_is_left_to_rebuild_from; set TANDEM_QDRANT_URL."
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
	let (failure_id, ..) = super::expect_failure_recorded(&failing, &super::sync_job("P1")).await;

	sqlx::query("DELETE FROM listings WHERE provider = $1 AND natural_id = $2")
		.bind("bunjang")
		.bind("P1")
		.execute(&failing.db.pool)
		.await
		.expect("Failed to drop the listing row.");
	sqlx::query("UPDATE failed_operations SET error_details = '{}'::jsonb WHERE failure_id = $1")
		.bind(failure_id)
		.execute(&failing.db.pool)
		.await
		.expect("Failed to scrub the captured payload.");

	let healthy = super::build_service(
		super::test_config(dsn, qdrant_url, collection),
		super::stub_providers(),
	)
	.await;
	let report = healthy
		.retry_failures(&[failure_id], OffsetDateTime::now_utc())
		.await
		.expect("Failed to retry failures.");

	assert_eq!(report.abandoned, 1);

	let failures = healthy.list_failures(10, 0).await.expect("Failed to list failures.");
	let row = failures
		.iter()
		.find(|row| row.failure_id == failure_id)
		.expect("The abandoned row must stay visible to the operator.");

	assert!(row.is_permanent());
	assert!(row.error_message.contains("abandoned"));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
