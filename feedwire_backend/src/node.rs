use crate::api;
use crate::bootstrap;
use crate::config::FeedwireConfig;
use crate::feed::FeedService;
use anyhow::Result;
use tokio_util::sync::CancellationToken;

/// Convenience wrapper that bootstraps the backend once and hands out
/// cloned handles for whichever entrypoint needs them.
pub struct FeedwireNode {
    config: FeedwireConfig,
    feed: FeedService,
    shutdown: CancellationToken,
}

impl FeedwireNode {
    /// Bootstraps all persistent state and builds the feed service.
    pub async fn start(config: FeedwireConfig) -> Result<Self> {
        let bootstrap = bootstrap::initialize(&config).await?;
        let feed = FeedService::new(bootstrap.database.clone(), &config.feed);

        tracing::info!(
            directories_created = ?bootstrap.directories_created,
            database_initialized = bootstrap.database_initialized,
            db_path = %config.paths.db_path.display(),
            "feedwire node initialized"
        );

        Ok(Self {
            config,
            feed,
            shutdown: CancellationToken::new(),
        })
    }

    /// Returns a snapshot of the node's reusable handles.
    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            config: self.config.clone(),
            feed: self.feed.clone(),
        }
    }

    /// Runs the REST API server until Ctrl-C or [`FeedwireNode::shutdown`].
    pub async fn run_http_server(&self) -> Result<()> {
        let token = self.shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
                token.cancel();
            }
        });

        let snapshot = self.snapshot();
        api::serve_http(snapshot.config, snapshot.feed, self.shutdown.clone()).await
    }

    /// Stops the HTTP server and wakes every pending long-poll.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn feed(&self) -> FeedService {
        self.feed.clone()
    }
}

/// Cloned handles for consumers that do not need to own the node.
#[derive(Clone)]
pub struct NodeSnapshot {
    pub config: FeedwireConfig,
    pub feed: FeedService,
}
