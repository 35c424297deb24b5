use std::path::PathBuf;
use std::sync::Arc;

use twitter_list_scraper::annotator::OpenAiAnnotator;
use twitter_list_scraper::config::FileConfigManager;
use twitter_list_scraper::pipeline::Pipeline;
use twitter_list_scraper::storage::FirebaseStore;

#[tokio::main]
async fn main() -> twitter_list_scraper::error::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config_manager = FileConfigManager::new(config_path);
    let config = config_manager.load_config()?;

    tracing::info!("Starting Twitter List Scraper");

    let store = Arc::new(FirebaseStore::new(&config.firebase)?);
    let annotator = OpenAiAnnotator::new(&config.openai)?;
    let pipeline = Pipeline::new(config, store, annotator)?;

    let summary = pipeline.run().await?;

    tracing::info!(
        "Run complete: {} collected, {} stored, {} duplicates",
        summary.collected,
        summary.stored,
        summary.duplicates
    );
    Ok(())
}
