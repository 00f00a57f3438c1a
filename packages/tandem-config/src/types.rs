use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub queue: Queue,
	pub providers: Providers,
	#[serde(default)]
	pub consumer: Consumer,
	#[serde(default)]
	pub retry: Retry,
	#[serde(default)]
	pub ingest: Ingest,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Queue {
	pub url: String,
	#[serde(default = "default_queue_name")]
	pub queue_name: String,
	#[serde(default = "default_blocking_timeout_secs")]
	pub blocking_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Consumer {
	pub workers: usize,
	pub processing_timeout_secs: u64,
}
impl Default for Consumer {
	fn default() -> Self {
		Self { workers: 4, processing_timeout_secs: 60 }
	}
}

/// Backoff tunables. Defaults to 60 s doubling per attempt, capped at one hour, with three
/// attempts before a failure is left for the operator.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Retry {
	pub max_retries: i32,
	pub base_delay_secs: i64,
	pub max_delay_secs: i64,
	pub scan_interval_secs: u64,
	pub claim_batch_size: i64,
	pub resolved_retention_days: i64,
}
impl Default for Retry {
	fn default() -> Self {
		Self {
			max_retries: 3,
			base_delay_secs: 60,
			max_delay_secs: 3_600,
			scan_interval_secs: 30,
			claim_batch_size: 50,
			resolved_retention_days: 30,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Ingest {
	pub default_provider: String,
}
impl Default for Ingest {
	fn default() -> Self {
		Self { default_provider: "bunjang".to_string() }
	}
}

fn default_queue_name() -> String {
	"indexer_jobs".to_string()
}

fn default_blocking_timeout_secs() -> u64 {
	5
}
