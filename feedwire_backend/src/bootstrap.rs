use crate::config::FeedwireConfig;
use crate::database::Database;
use anyhow::{Context, Result};
use std::fs;

pub struct BootstrapResources {
    pub directories_created: Vec<String>,
    pub database_initialized: bool,
    pub database: Database,
}

/// Creates the on-disk layout and brings the schema up to date.
pub async fn initialize(config: &FeedwireConfig) -> Result<BootstrapResources> {
    let mut directories_created = Vec::new();
    create_dir_if_missing(&config.paths.data_dir, &mut directories_created)?;
    create_dir_if_missing(&config.paths.logs_dir, &mut directories_created)?;

    let database = Database::connect(&config.paths)
        .with_context(|| format!("failed to open {}", config.paths.db_path.display()))?;
    let database_initialized = database
        .ensure_migrations()
        .context("failed to apply schema migrations")?;

    Ok(BootstrapResources {
        directories_created,
        database_initialized,
        database,
    })
}

fn create_dir_if_missing(path: &std::path::Path, created: &mut Vec<String>) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        created.push(path.display().to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeedConfig, FeedwirePaths};

    #[tokio::test]
    async fn initialize_creates_layout_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = FeedwireConfig::new(
            0,
            FeedwirePaths::from_base_dir(dir.path()).unwrap(),
            FeedConfig::default(),
        );

        let first = initialize(&config).await.unwrap();
        assert_eq!(first.directories_created.len(), 2);
        assert!(first.database_initialized);
        assert!(config.paths.db_path.exists());
        drop(first);

        let second = initialize(&config).await.unwrap();
        assert!(second.directories_created.is_empty());
        assert!(!second.database_initialized);
    }
}
