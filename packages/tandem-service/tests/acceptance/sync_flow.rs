use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};

use qdrant_client::qdrant::value::Kind;

use tandem_domain::identity;
use tandem_service::Providers;
use tandem_storage::listings;

use super::{SpyEmbedding, TEST_VECTOR_DIM};

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set TANDEM_PG_DSN and TANDEM_QDRANT_URL to run."]
async fn sync_lands_in_both_stores_and_replays_cleanly() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping sync_lands_in_both_stores_and_replays_cleanly; set TANDEM_PG_DSN.");

		return;
	};
	let Some(qdrant_url) = super::test_qdrant_url() else {
		eprintln!("Skipping sync_lands_in_both_stores_and_replays_cleanly; set TANDEM_QDRANT_URL.");

		return;
	};
	let calls = Arc::new(AtomicUsize::new(0));
	let providers =
		Providers::new(Arc::new(SpyEmbedding { vector_dim: TEST_VECTOR_DIM, calls: calls.clone() }));
	let collection = test_db.collection_name("tandem_acceptance");
	let cfg = super::test_config(test_db.dsn().to_string(), qdrant_url, collection);
	let service = super::build_service(cfg, providers).await;
	let job = super::sync_job("P1");

	super::expect_applied(&service, &job).await;

	let listing = listings::fetch_listing(&service.db, "bunjang", "P1")
		.await
		.expect("Failed to fetch listing.")
		.expect("Expected a listing row.");

	assert!(listing.is_active());
	assert!(listing.indexed, "The indexed flag must rise after the waited point upsert.");
	assert_eq!(listing.listing_id, identity::point_id("bunjang", "P1"));
	assert_eq!(listing.title, "2019 coupe, one owner");

	let point = service
		.qdrant
		.fetch_point(listing.listing_id)
		.await
		.expect("Failed to fetch point.")
		.expect("Expected a Qdrant point.");
	let provider_value = point.payload.get("provider").and_then(|value| value.kind.as_ref());
	let scheme_value = point.payload.get("scheme_id").and_then(|value| value.kind.as_ref());

	assert!(matches!(provider_value, Some(Kind::StringValue(value)) if value == "bunjang"));
	assert!(
		matches!(scheme_value, Some(Kind::StringValue(value)) if value == identity::SCHEME_ID),
		"Points must carry the identity scheme tag."
	);

	// A replay of the same message converges on the same row and point.
	super::expect_applied(&service, &job).await;

	let replayed = listings::fetch_listing(&service.db, "bunjang", "P1")
		.await
		.expect("Failed to re-fetch listing.")
		.expect("Expected the listing row to survive a replay.");

	assert_eq!(replayed.listing_id, listing.listing_id);
	assert!(replayed.indexed);
	assert_eq!(calls.load(Ordering::SeqCst), 2);

	let status = service.ledger_status().await.expect("Failed to read ledger status.");

	assert_eq!(status.unresolved_failures, 0);
	assert_eq!(status.permanent_failures, 0);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set TANDEM_PG_DSN and TANDEM_QDRANT_URL to run."]
async fn update_without_an_existing_row_degrades_to_sync() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping update_without_an_existing_row_degrades_to_sync; set TANDEM_PG_DSN.");

		return;
	};
	let Some(qdrant_url) = super::test_qdrant_url() else {
		eprintln!(
			"Skipping update_without_an_existing_row_degrades_to_sync; set TANDEM_QDRANT_URL."
		);

		return;
	};
	let collection = test_db.collection_name("tandem_acceptance");
	let cfg = super::test_config(test_db.dsn().to_string(), qdrant_url, collection);
	let service = super::build_service(cfg, super::stub_providers()).await;
	let job = super::decode_job(serde_json::json!({
		"type": "update",
		"product_id": "P9",
		"product_data": { "pid": "P9", "title": "Fresh listing seen first as an update" }
	}));

	super::expect_applied(&service, &job).await;

	let listing = listings::fetch_listing(&service.db, "bunjang", "P9")
		.await
		.expect("Failed to fetch listing.")
		.expect("An update with no prior row must create one.");

	assert!(listing.indexed);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
