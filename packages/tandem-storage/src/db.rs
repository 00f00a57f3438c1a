use sqlx::{PgPool, Postgres, Transaction, postgres::PgPoolOptions};

use crate::{Result, schema};

pub struct Db {
	pub pool: PgPool,
}

/// A cross-process lease on an i64 key, backed by `pg_advisory_xact_lock` and held until the
/// lease is released or dropped. Acquisition blocks while another holder exists, so callers
/// should acquire under their own deadline.
pub struct KeyLease {
	tx: Transaction<'static, Postgres>,
}
impl KeyLease {
	pub async fn release(self) -> Result<()> {
		self.tx.commit().await?;

		Ok(())
	}
}
impl Db {
	pub async fn connect(cfg: &tandem_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		let sql = schema::render_schema();
		let lock_id: i64 = 7_261_104;
		// Advisory locks are held per connection. Use a single transaction so the lock is scoped to
		// one connection and automatically released when the transaction ends.
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(lock_id).execute(&mut *tx).await?;

		for statement in sql.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}

	/// Serializes work on `key` across every process sharing this database. The lock is scoped to
	/// the lease's transaction, so a crashed or cancelled holder releases it automatically.
	pub async fn acquire_key_lease(&self, key: i64) -> Result<KeyLease> {
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(key).execute(&mut *tx).await?;

		Ok(KeyLease { tx })
	}
}
