use std::collections::BTreeMap;

use time::OffsetDateTime;

use tandem_storage::{ledger, models::FailedOperation};

use crate::{Result, TandemService};

#[derive(Debug)]
pub struct LedgerStatus {
	pub unresolved_failures: i64,
	pub permanent_failures: i64,
	pub failures_by_type: BTreeMap<String, i64>,
}

impl TandemService {
	pub async fn ledger_status(&self) -> Result<LedgerStatus> {
		let counts = ledger::unresolved_counts(&self.db).await?;

		Ok(LedgerStatus {
			unresolved_failures: counts.unresolved,
			permanent_failures: counts.permanent,
			failures_by_type: counts.by_type.into_iter().collect(),
		})
	}

	pub async fn list_failures(&self, limit: i64, offset: i64) -> Result<Vec<FailedOperation>> {
		Ok(ledger::list_unresolved_failures(&self.db, limit, offset).await?)
	}

	/// Housekeeping: drops resolved rows past the retention window.
	pub async fn purge_resolved(&self, now: OffsetDateTime) -> Result<u64> {
		Ok(ledger::purge_resolved_failures(&self.db, now, self.cfg.retry.resolved_retention_days)
			.await?)
	}
}
