use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = tandem_worker::Args::parse();

	tandem_worker::run(args).await
}
