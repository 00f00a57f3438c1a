mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, Consumer, EmbeddingProviderConfig, Ingest, Postgres, Providers, Qdrant, Queue, Retry,
	Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.vector_dim == 0 {
		return Err(Error::Validation {
			message: "storage.qdrant.vector_dim must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.api_key must be non-empty.".to_string(),
		});
	}
	if cfg.queue.queue_name.trim().is_empty() {
		return Err(Error::Validation { message: "queue.queue_name must be non-empty.".to_string() });
	}
	if cfg.consumer.workers == 0 {
		return Err(Error::Validation {
			message: "consumer.workers must be greater than zero.".to_string(),
		});
	}
	if cfg.consumer.processing_timeout_secs == 0 {
		return Err(Error::Validation {
			message: "consumer.processing_timeout_secs must be greater than zero.".to_string(),
		});
	}
	if cfg.retry.max_retries <= 0 {
		return Err(Error::Validation {
			message: "retry.max_retries must be greater than zero.".to_string(),
		});
	}
	if cfg.retry.base_delay_secs <= 0 {
		return Err(Error::Validation {
			message: "retry.base_delay_secs must be greater than zero.".to_string(),
		});
	}
	if cfg.retry.max_delay_secs < cfg.retry.base_delay_secs {
		return Err(Error::Validation {
			message: "retry.max_delay_secs must be at least retry.base_delay_secs.".to_string(),
		});
	}
	if cfg.retry.claim_batch_size <= 0 {
		return Err(Error::Validation {
			message: "retry.claim_batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.retry.resolved_retention_days <= 0 {
		return Err(Error::Validation {
			message: "retry.resolved_retention_days must be greater than zero.".to_string(),
		});
	}
	if cfg.ingest.default_provider.trim().is_empty() {
		return Err(Error::Validation {
			message: "ingest.default_provider must be non-empty.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let queue_name = cfg.queue.queue_name.trim();

	if queue_name != cfg.queue.queue_name {
		cfg.queue.queue_name = queue_name.to_string();
	}

	let provider = cfg.ingest.default_provider.trim();

	if provider != cfg.ingest.default_provider {
		cfg.ingest.default_provider = provider.to_string();
	}
}
