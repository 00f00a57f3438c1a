use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = tandem_api::Args::parse();

	tandem_api::run(args).await
}
