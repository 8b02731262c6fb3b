//! Résout une requête sur les nœuds déclarés dans la configuration
//!
//! ```text
//! PMOLINK_CONFIG__LINK__NODES='[{identifier: main, host: 127.0.0.1, port: 2333, password: youshallnotpass}]' \
//!     cargo run -p pmolink --example resolve -- "daft punk one more time"
//! ```

use pmolink::{LinkConfigExt, NodePool, Resolution};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = pmoconfig::get_config();
    let level = config.get_log_min_level()?.to_lowercase();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    let query = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "never gonna give you up".to_string());

    if config.get_link_nodes()?.is_empty() {
        warn!("No node configured under link.nodes");
        return Ok(());
    }

    let pool = NodePool::from_config(&config, 0).await?;
    let node = pool.best_node().await?;
    info!("Resolving {:?} on {}", query, node.identifier());

    match node.search(&query).await? {
        Resolution::Tracks(tracks) => {
            for track in tracks.iter().take(5) {
                println!("{} ({} ms) {}", track, track.length(), track.uri().unwrap_or("-"));
            }
        }
        Resolution::Playlist(playlist) => {
            println!("{} ({} tracks)", playlist.name(), playlist.track_count());
        }
    }

    pool.shutdown().await?;
    Ok(())
}
