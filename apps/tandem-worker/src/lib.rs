use clap::Parser;
use tracing_subscriber::EnvFilter;

pub mod worker;

#[derive(Debug, Parser)]
#[command(
	version = tandem_cli::VERSION,
	rename_all = "kebab",
	styles = tandem_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = tandem_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = tandem_storage::db::Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let qdrant = tandem_storage::qdrant::QdrantStore::new(&config.storage.qdrant)?;

	qdrant.ensure_collection().await?;

	let queue = tandem_queue::JobQueue::connect(&config.queue).await?;
	let service = tandem_service::TandemService::new(config, db, qdrant);

	worker::run_worker(service, queue).await
}
