use tankobon::auth;
use tankobon::config::Config;
use tankobon::discover::discover;
use tankobon::mangadex::client::MangaDexClient;
use tankobon::name_map::NameIdMap;
use tankobon::publish::publish_chapter;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Use RUST_LOG env var if set, otherwise default to info level
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let name_map = NameIdMap::load()?;
    let token = auth::access_token()?;
    let client = MangaDexClient::new(&config.api_base_url, token);

    let chapters = discover(&config.chapter_root, &name_map)?;
    info!(
        "Discovered {} chapter(s) under {}",
        chapters.len(),
        config.chapter_root.display()
    );

    // Chapters run strictly one at a time: the platform allows a single
    // active upload session per account.
    let mut published = 0usize;
    let mut failed = 0usize;
    for descriptor in &chapters {
        match publish_chapter(&client, descriptor).await {
            Ok(chapter_id) => {
                info!(
                    "Published {} -> chapter {}",
                    descriptor.source_path.display(),
                    chapter_id
                );
                published += 1;
            }
            Err(e) => {
                warn!(
                    "Failed to publish {}: {}",
                    descriptor.source_path.display(),
                    e
                );
                failed += 1;
            }
        }
    }

    info!("Done: {} published, {} failed", published, failed);
    Ok(())
}
