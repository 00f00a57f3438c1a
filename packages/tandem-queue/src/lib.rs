mod error;

pub use error::{Error, Result};

use redis::{AsyncCommands, aio::ConnectionManager};

/// A Redis list used as a work queue. Producers LPUSH raw job messages; consumers BRPOP them, so
/// jobs come off the queue oldest first.
pub struct JobQueue {
	conn: ConnectionManager,
	queue_name: String,
	blocking_timeout_secs: u64,
}
impl JobQueue {
	pub async fn connect(cfg: &tandem_config::Queue) -> Result<Self> {
		let client = redis::Client::open(cfg.url.as_str())?;
		let conn = client.get_connection_manager().await?;

		Ok(Self {
			conn,
			queue_name: cfg.queue_name.clone(),
			blocking_timeout_secs: cfg.blocking_timeout_secs,
		})
	}

	pub fn queue_name(&self) -> &str {
		&self.queue_name
	}

	pub async fn push(&self, message: &[u8]) -> Result<()> {
		let mut conn = self.conn.clone();

		conn.lpush::<_, _, ()>(&self.queue_name, message).await?;

		Ok(())
	}

	/// Blocks up to the configured timeout; `None` means the queue stayed empty, not an error.
	pub async fn pop(&self) -> Result<Option<Vec<u8>>> {
		let mut conn = self.conn.clone();
		let reply: Option<(String, Vec<u8>)> =
			conn.brpop(&self.queue_name, self.blocking_timeout_secs as f64).await?;

		Ok(reply.map(|(_, payload)| payload))
	}

	pub async fn depth(&self) -> Result<u64> {
		let mut conn = self.conn.clone();
		let depth: u64 = conn.llen(&self.queue_name).await?;

		Ok(depth)
	}
}
