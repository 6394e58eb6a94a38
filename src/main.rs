use anyhow::Result;
use clap::Parser;
use simrec_engine::config::{CliArgs, EngineConfig};
use simrec_engine::engine::Engine;
use simrec_engine::server::EngineServer;
use simrec_engine::transport::NdjsonTransport;

fn main() -> Result<()> {
	let args = CliArgs::parse();

	// Logging goes to stderr; stdout carries protocol lines only
	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
		)
		.init();

	let config = EngineConfig::from_args(&args);
	tracing::info!(
		savepath = %config.savepath,
		saveinterval_ms = config.saveinterval_ms,
		"starting engine"
	);

	let engine = Engine::new(config);
	let mut server = EngineServer::new(engine, NdjsonTransport::new());

	tracing::info!("simrec-engine ready");
	server.run()?;
	Ok(())
}
