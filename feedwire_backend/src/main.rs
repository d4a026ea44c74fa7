use anyhow::Result;
use clap::{Parser, Subcommand};
use feedwire_backend::bootstrap;
use feedwire_backend::config::FeedwireConfig;
use feedwire_backend::node::FeedwireNode;
use feedwire_backend::telemetry;
use feedwire_backend::utils;

#[derive(Parser)]
#[command(author, version, about = "Feedwire social feed backend")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (Axum) for REST/API access
    Serve,
    /// Create the data directories and database schema, then exit
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::print_banner();
    telemetry::init_tracing();

    let args = Args::parse();
    let config = FeedwireConfig::from_env()?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let node = FeedwireNode::start(config).await?;
            tracing::info!("bootstrap complete");
            node.run_http_server().await
        }
        Command::Init => {
            let resources = bootstrap::initialize(&config).await?;
            tracing::info!(
                directories_created = ?resources.directories_created,
                database_initialized = resources.database_initialized,
                base = %config.paths.base.display(),
                "initialization complete"
            );
            Ok(())
        }
    }
}
