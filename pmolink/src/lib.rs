//! # pmolink - Client Lavalink
//!
//! Cette crate délègue le décodage et la lecture audio à des nœuds
//! [Lavalink](https://github.com/freyacodes/Lavalink) joints par WebSocket
//! et par une API REST.
//!
//! ## Architecture
//!
//! - [`NodePool`] : registre des nœuds, sélection du moins chargé
//! - [`Node`] : connexion WebSocket, reconnexion, opérations sortantes
//! - [`TrackResolver`] : classification des requêtes et `GET /loadtracks`
//! - [`SessionRouter`] : distribution des trames aux sessions ([`Session`])
//! - [`filters`] : filtres audio validés
//! - [`LinkConfigExt`] : lecture de la configuration `pmoconfig`
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use pmolink::{NodeConfig, NodePool, ResolveOptions, Resolution};
//!
//! #[tokio::main]
//! async fn main() -> pmolink::Result<()> {
//!     let pool = NodePool::new(123456789);
//!     pool.create_node(NodeConfig::new("main", "127.0.0.1", 2333, "youshallnotpass"))
//!         .await?;
//!
//!     let node = pool.best_node().await?;
//!     match node.get_tracks("daft punk one more time", &ResolveOptions::new()).await? {
//!         Resolution::Tracks(tracks) => println!("{} result(s)", tracks.len()),
//!         Resolution::Playlist(playlist) => println!("playlist {}", playlist.name()),
//!     }
//!
//!     pool.shutdown().await
//! }
//! ```

pub mod backoff;
pub mod config_ext;
pub mod error;
pub mod filters;
pub mod node;
pub mod objects;
pub mod pool;
pub mod protocol;
pub mod resolver;
pub mod router;

pub use backoff::{Backoff, ReconnectPolicy};
pub use config_ext::LinkConfigExt;
pub use error::{ConnectionFailureKind, LinkError, Result, TrackLoadKind};
pub use filters::{
    ChannelMix, Distortion, Equalizer, Filter, Karaoke, LowPass, Rotation, Timescale, Tremolo,
    Vibrato,
};
pub use node::{Node, NodeConfig, NodeState, SpotifyCredentials};
pub use objects::{Playlist, RequestContext, Resolution, SearchType, Track, TrackInfo};
pub use pool::NodePool;
pub use protocol::{ControlMessage, Frame, NodeStats};
pub use resolver::{ResolveOptions, TrackResolver};
pub use router::{RouteOutcome, Session, SessionRouter, VoiceDispatch};
