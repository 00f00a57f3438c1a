use tandem_domain::identity;
use tandem_storage::listings;

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set TANDEM_PG_DSN and TANDEM_QDRANT_URL to run."]
async fn delete_clears_both_stores_and_replays_converge() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping delete_clears_both_stores_and_replays_converge; set TANDEM_PG_DSN.");

		return;
	};
	let Some(qdrant_url) = super::test_qdrant_url() else {
		eprintln!("Skipping delete_clears_both_stores_and_replays_converge; set TANDEM_QDRANT_URL.");

		return;
	};
	let collection = test_db.collection_name("tandem_acceptance");
	let cfg = super::test_config(test_db.dsn().to_string(), qdrant_url, collection);
	let service = super::build_service(cfg, super::stub_providers()).await;

	super::expect_applied(&service, &super::sync_job("P1")).await;
	super::expect_applied(&service, &super::delete_job("P1")).await;

	let point_id = identity::point_id("bunjang", "P1");
	let point = service.qdrant.fetch_point(point_id).await.expect("Failed to fetch point.");

	assert!(point.is_none(), "The point must be gone after a delete.");

	let listing = listings::fetch_listing(&service.db, "bunjang", "P1")
		.await
		.expect("Failed to fetch listing.")
		.expect("The soft-deleted row must remain in the store of record.");

	assert!(listing.deleted_at.is_some());
	assert!(!listing.indexed);

	// Replayed and never-seen deletes converge without touching the ledger.
	super::expect_applied(&service, &super::delete_job("P1")).await;
	super::expect_applied(&service, &super::delete_job("P404")).await;

	let status = service.ledger_status().await.expect("Failed to read ledger status.");

	assert_eq!(status.unresolved_failures, 0);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set TANDEM_PG_DSN and TANDEM_QDRANT_URL to run."]
async fn resync_after_delete_revives_the_listing() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping resync_after_delete_revives_the_listing; set TANDEM_PG_DSN.");

		return;
	};
	let Some(qdrant_url) = super::test_qdrant_url() else {
		eprintln!("Skipping resync_after_delete_revives_the_listing; set TANDEM_QDRANT_URL.");

		return;
	};
	let collection = test_db.collection_name("tandem_acceptance");
	let cfg = super::test_config(test_db.dsn().to_string(), qdrant_url, collection);
	let service = super::build_service(cfg, super::stub_providers()).await;

	super::expect_applied(&service, &super::sync_job("P1")).await;
	super::expect_applied(&service, &super::delete_job("P1")).await;
	super::expect_applied(&service, &super::sync_job("P1")).await;

	let listing = listings::fetch_listing(&service.db, "bunjang", "P1")
		.await
		.expect("Failed to fetch listing.")
		.expect("Expected a revived listing row.");

	assert!(listing.is_active());
	assert!(listing.indexed);

	let point = service.qdrant.fetch_point(listing.listing_id).await.expect("Failed to fetch point.");

	assert!(point.is_some(), "The point must be back after a re-sync.");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
