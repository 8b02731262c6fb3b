//! Connexion à un nœud Lavalink
//!
//! Un [`Node`] possède un WebSocket (trames entrantes, opérations sortantes)
//! et un client REST (chargement de pistes). Sa boucle de réception tourne
//! dans une tâche dédiée et se reconnecte seule après une coupure.

use crate::backoff::{Backoff, ReconnectPolicy};
use crate::error::{ConnectionFailureKind, LinkError, Result};
use crate::objects::{RequestContext, Resolution, SearchType, Track};
use crate::pool::PoolShared;
use crate::protocol::{ControlMessage, Frame, NodeStats, RESUME_KEY};
use crate::resolver::{ResolveOptions, TrackResolver};
use crate::router::{RouteOutcome, Session, SessionRouter, VoiceDispatch};
use futures::stream::{SplitSink, SplitStream};
use futures::{FutureExt, SinkExt, StreamExt};
use pmospotify::SpotifyClient;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Valeur de l'en-tête `Client-Name`
pub const CLIENT_NAME: &str = concat!("pmolink/", env!("CARGO_PKG_VERSION"));

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// Credentials d'application Spotify
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub market: Option<String>,
}

/// Description d'un nœud à enregistrer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub identifier: String,
    pub host: String,
    pub port: u16,
    pub password: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub spotify: Option<SpotifyCredentials>,
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
    /// Source de recherche par défaut de [`Node::resolve_options`]
    #[serde(default)]
    pub search_type: SearchType,
}

impl NodeConfig {
    pub fn new(identifier: &str, host: &str, port: u16, password: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            host: host.to_string(),
            port,
            password: password.to_string(),
            secure: false,
            spotify: None,
            reconnect: ReconnectPolicy::default(),
            search_type: SearchType::default(),
        }
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_spotify(mut self, credentials: SpotifyCredentials) -> Self {
        self.spotify = Some(credentials);
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = search_type;
        self
    }

    pub fn ws_uri(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    pub fn rest_uri(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

/// État de la connexion WebSocket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NodeState::Disconnected => "disconnected",
            NodeState::Connecting => "connecting",
            NodeState::Connected => "connected",
            NodeState::Reconnecting => "reconnecting",
        };
        f.write_str(text)
    }
}

struct NodeInner {
    config: NodeConfig,
    user_id: u64,
    available: AtomicBool,
    state: RwLock<NodeState>,
    stats: RwLock<Option<NodeStats>>,
    writer: Mutex<Option<WsWriter>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    router: SessionRouter,
    resolver: TrackResolver,
    pool: OnceLock<Weak<PoolShared>>,
}

/// Nœud Lavalink (handle partagé, peu coûteux à cloner)
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("identifier", &self.inner.config.identifier)
            .field("ws_uri", &self.ws_uri())
            .field("available", &self.is_available())
            .finish()
    }
}

impl Node {
    /// Crée un nœud non connecté
    ///
    /// `user_id` est l'identifiant Discord du bot, envoyé dans `User-Id`.
    pub fn new(config: NodeConfig, user_id: u64) -> Result<Self> {
        let mut resolver = TrackResolver::new(config.rest_uri(), config.password.clone())?;

        if let Some(credentials) = &config.spotify {
            if !credentials.client_id.is_empty() && !credentials.client_secret.is_empty() {
                let mut spotify =
                    SpotifyClient::new(&credentials.client_id, &credentials.client_secret)?;
                if let Some(market) = &credentials.market {
                    spotify = spotify.with_market(market);
                }
                resolver = resolver.with_spotify(Arc::new(spotify));
            }
        }

        Ok(Self {
            inner: Arc::new(NodeInner {
                config,
                user_id,
                available: AtomicBool::new(false),
                state: RwLock::new(NodeState::Disconnected),
                stats: RwLock::new(None),
                writer: Mutex::new(None),
                listener: Mutex::new(None),
                cancel: CancellationToken::new(),
                router: SessionRouter::new(),
                resolver,
                pool: OnceLock::new(),
            }),
        })
    }

    pub(crate) fn attach_pool(&self, pool: Weak<PoolShared>) {
        let _ = self.inner.pool.set(pool);
    }

    pub(crate) fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ============ Accesseurs ============

    pub fn identifier(&self) -> &str {
        &self.inner.config.identifier
    }

    pub fn host(&self) -> &str {
        &self.inner.config.host
    }

    pub fn port(&self) -> u16 {
        self.inner.config.port
    }

    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    pub fn user_id(&self) -> u64 {
        self.inner.user_id
    }

    pub fn ws_uri(&self) -> String {
        self.inner.config.ws_uri()
    }

    pub fn rest_uri(&self) -> String {
        self.inner.config.rest_uri()
    }

    /// Vrai si le nœud peut recevoir du travail
    pub fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::SeqCst)
    }

    pub async fn state(&self) -> NodeState {
        *self.inner.state.read().await
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await == NodeState::Connected
    }

    /// Dernières statistiques reçues
    pub async fn stats(&self) -> Option<NodeStats> {
        self.inner.stats.read().await.clone()
    }

    pub fn router(&self) -> &SessionRouter {
        &self.inner.router
    }

    pub fn resolver(&self) -> &TrackResolver {
        &self.inner.resolver
    }

    // ============ Sessions ============

    pub async fn register_session(&self, guild_id: u64, session: Arc<dyn Session>) {
        if self.inner.router.register(guild_id, session).await.is_some() {
            debug!(node = %self.identifier(), guild_id, "Replaced existing session");
        }
    }

    pub async fn get_session(&self, guild_id: u64) -> Option<Arc<dyn Session>> {
        self.inner.router.get(guild_id).await
    }

    pub async fn remove_session(&self, guild_id: u64) -> Option<Arc<dyn Session>> {
        self.inner.router.unregister(guild_id).await
    }

    pub async fn session_count(&self) -> usize {
        self.inner.router.len().await
    }

    /// Transmet un événement vocal de la gateway hôte à la session concernée
    pub async fn handle_voice_dispatch(&self, dispatch: &VoiceDispatch) -> RouteOutcome {
        self.inner
            .router
            .route_voice_dispatch(dispatch, self.inner.user_id)
            .await
    }

    // ============ Connexion ============

    /// Ouvre le WebSocket et démarre la boucle de réception
    ///
    /// # Errors
    ///
    /// * `LinkError::ConnectionFailure` - mot de passe refusé, URI invalide
    ///   ou nœud injoignable
    pub async fn connect(&self) -> Result<()> {
        if self.inner.cancel.is_cancelled() {
            return Err(LinkError::NodeUnavailable(self.identifier().to_string()));
        }

        *self.inner.state.write().await = NodeState::Connecting;
        let reader = match self.open_socket().await {
            Ok(reader) => reader,
            Err(e) => {
                self.inner.available.store(false, Ordering::SeqCst);
                self.inner.writer.lock().await.take();
                *self.inner.state.write().await = NodeState::Disconnected;
                return Err(e);
            }
        };

        let node = self.clone();
        let handle = tokio::spawn(async move { node.listen(reader).await });
        if let Some(previous) = self.inner.listener.lock().await.replace(handle) {
            previous.abort();
        }

        info!(node = %self.identifier(), uri = %self.ws_uri(), "Node connected");
        Ok(())
    }

    /// Handshake, puis envoi de `configureResuming`
    async fn open_socket(&self) -> Result<WsReader> {
        let identifier = self.identifier();
        let invalid_uri = || LinkError::connection(identifier, ConnectionFailureKind::InvalidUri);

        url::Url::parse(&self.ws_uri()).map_err(|_| invalid_uri())?;
        let mut request = self
            .ws_uri()
            .into_client_request()
            .map_err(|_| invalid_uri())?;

        let header = |value: &str| {
            HeaderValue::from_str(value).map_err(|_| {
                LinkError::connection(identifier, ConnectionFailureKind::InvalidCredentials)
            })
        };
        let headers = request.headers_mut();
        headers.insert("Authorization", header(&self.inner.config.password)?);
        headers.insert("User-Id", header(&self.inner.user_id.to_string())?);
        headers.insert("Client-Name", header(CLIENT_NAME)?);
        headers.insert("Resume-Key", header(RESUME_KEY)?);

        debug!(node = %identifier, "Opening WebSocket");
        let (mut stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| {
                warn!(node = %identifier, "WebSocket handshake failed: {}", e);
                LinkError::connection(identifier, failure_kind(&e))
            })?;

        // Publication sous le verrou du writer : `disconnect` le prend après
        // avoir annulé, il voit donc soit ce socket, soit aucun.
        let reader = {
            let mut writer = self.inner.writer.lock().await;
            if self.inner.cancel.is_cancelled() {
                drop(writer);
                debug!(node = %identifier, "Node disconnected during handshake");
                if let Err(e) = stream.close(None).await {
                    debug!(node = %identifier, "Socket already closed: {}", e);
                }
                return Err(LinkError::NodeUnavailable(identifier.to_string()));
            }

            let (sink, reader) = stream.split();
            *writer = Some(sink);
            *self.inner.state.write().await = NodeState::Connected;
            self.inner.available.store(true, Ordering::SeqCst);
            reader
        };

        self.send(&ControlMessage::configure_resuming()).await?;
        Ok(reader)
    }

    /// Envoie une opération au nœud
    ///
    /// # Errors
    ///
    /// * `LinkError::NodeUnavailable` - le nœud ne doit pas recevoir de travail
    pub async fn send(&self, message: &ControlMessage) -> Result<()> {
        if !self.is_available() {
            return Err(LinkError::NodeUnavailable(self.identifier().to_string()));
        }

        let json = serde_json::to_string(message)?;
        let mut writer = self.inner.writer.lock().await;
        let sink = writer
            .as_mut()
            .ok_or_else(|| LinkError::NodeUnavailable(self.identifier().to_string()))?;

        debug!(node = %self.identifier(), op = message.op(), "Sending");
        sink.send(Message::Text(json)).await?;
        Ok(())
    }

    /// Boucle de réception ; se termine sur annulation ou abandon des reconnexions
    async fn listen(self, mut reader: WsReader) {
        let policy = self.inner.config.reconnect.clone();
        let mut backoff = Backoff::from_policy(&policy);

        loop {
            let message = tokio::select! {
                biased;
                _ = self.inner.cancel.cancelled() => return,
                message = reader.next() => message,
            };

            match message {
                Some(Ok(Message::Text(text))) => self.spawn_frame(text),
                Some(Ok(Message::Close(frame))) => {
                    info!(node = %self.identifier(), ?frame, "WebSocket closed by node");
                    match self.reconnect(&mut backoff, policy.max_attempts).await {
                        Some(new_reader) => reader = new_reader,
                        None => return,
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(node = %self.identifier(), "WebSocket read error: {}", e);
                    match self.reconnect(&mut backoff, policy.max_attempts).await {
                        Some(new_reader) => reader = new_reader,
                        None => return,
                    }
                }
                None => {
                    info!(node = %self.identifier(), "WebSocket stream ended");
                    match self.reconnect(&mut backoff, policy.max_attempts).await {
                        Some(new_reader) => reader = new_reader,
                        None => return,
                    }
                }
            }
        }
    }

    /// Attend puis rouvre le socket jusqu'au succès, à l'annulation ou à
    /// l'épuisement des tentatives
    async fn reconnect(
        &self,
        backoff: &mut Backoff,
        max_attempts: Option<u32>,
    ) -> Option<WsReader> {
        self.inner.available.store(false, Ordering::SeqCst);
        *self.inner.state.write().await = NodeState::Reconnecting;
        self.inner.writer.lock().await.take();

        let mut attempts: u32 = 0;
        loop {
            if max_attempts.is_some_and(|max| attempts >= max) {
                error!(
                    node = %self.identifier(),
                    attempts,
                    "Giving up reconnecting, node stays unavailable"
                );
                *self.inner.state.write().await = NodeState::Disconnected;
                return None;
            }

            let delay = backoff.delay();
            info!(node = %self.identifier(), ?delay, attempt = attempts + 1, "Reconnecting");
            tokio::select! {
                biased;
                _ = self.inner.cancel.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }
            attempts += 1;

            if self.is_connected().await {
                continue;
            }

            let opened = self.open_socket().await;
            if self.inner.cancel.is_cancelled() {
                self.mark_disconnected().await;
                return None;
            }

            match opened {
                Ok(reader) => {
                    backoff.reset();
                    info!(node = %self.identifier(), "Node reconnected");
                    return Some(reader);
                }
                Err(e) => {
                    self.inner.available.store(false, Ordering::SeqCst);
                    *self.inner.state.write().await = NodeState::Reconnecting;
                    warn!(node = %self.identifier(), "Reconnect attempt failed: {}", e);
                }
            }
        }
    }

    /// Décode une trame et la traite dans sa propre tâche
    fn spawn_frame(&self, text: String) {
        let frame = match Frame::parse(&text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(node = %self.identifier(), "Skipping undecodable frame: {}", e);
                return;
            }
        };

        let node = self.clone();
        tokio::spawn(async move {
            let op = frame.op().to_string();
            let handled = AssertUnwindSafe(node.handle_frame(frame)).catch_unwind().await;
            if handled.is_err() {
                error!(node = %node.identifier(), op = %op, "Frame handler panicked");
            }
        });
    }

    async fn handle_frame(&self, frame: Frame) {
        match self.inner.router.route_frame(frame).await {
            RouteOutcome::Stats(stats) => {
                debug!(node = %self.identifier(), players = stats.players, "Stats updated");
                *self.inner.stats.write().await = Some(stats);
            }
            outcome => debug!(node = %self.identifier(), ?outcome, "Frame routed"),
        }
    }

    /// Ferme le socket puis fixe l'état terminal
    ///
    /// Le writer est pris avant l'écriture de l'état : un handshake en cours
    /// a soit déjà publié son socket (fermé ici), soit verra l'annulation.
    async fn mark_disconnected(&self) {
        self.inner.available.store(false, Ordering::SeqCst);
        self.close_writer().await;
        self.inner.available.store(false, Ordering::SeqCst);
        *self.inner.state.write().await = NodeState::Disconnected;
    }

    async fn close_writer(&self) {
        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            if let Err(e) = writer.close().await {
                debug!(node = %self.identifier(), "Socket already closed: {}", e);
            }
        }
    }

    /// Déconnecte le nœud et le retire de son pool
    ///
    /// Chaque session est détruite une fois. Sans effet sur un nœud déjà
    /// déconnecté, hormis son retrait du pool.
    pub async fn disconnect(&self) -> Result<()> {
        let first_call = !self.inner.cancel.is_cancelled();
        self.inner.cancel.cancel();
        self.mark_disconnected().await;

        if first_call {
            info!(node = %self.identifier(), "Disconnecting node");
            for (guild_id, session) in self.inner.router.drain().await {
                debug!(node = %self.identifier(), guild_id, "Destroying session");
                session.destroy().await;
            }
            self.inner.listener.lock().await.take();
        }

        if let Some(pool) = self.inner.pool.get().and_then(Weak::upgrade) {
            pool.remove_if_same(self).await;
        }
        Ok(())
    }

    /// Durée d'une connexion TCP vers le nœud
    pub async fn latency(&self) -> Result<Duration> {
        let start = Instant::now();
        TcpStream::connect((self.host(), self.port()))
            .await
            .map_err(|_| {
                LinkError::connection(self.identifier(), ConnectionFailureKind::Unreachable)
            })?;
        Ok(start.elapsed())
    }

    // ============ Pistes ============

    /// Résout une requête ; voir [`TrackResolver::resolve`]
    pub async fn get_tracks(&self, query: &str, options: &ResolveOptions) -> Result<Resolution> {
        self.inner.resolver.resolve(query, options).await
    }

    /// Options de résolution utilisant la source de recherche du nœud
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions::new().with_search_type(self.inner.config.search_type)
    }

    /// Résout une requête avec les options par défaut du nœud
    pub async fn search(&self, query: &str) -> Result<Resolution> {
        self.get_tracks(query, &self.resolve_options()).await
    }

    /// Reconstruit une piste à partir de son identifiant encodé
    pub async fn build_track(
        &self,
        identifier: &str,
        ctx: Option<RequestContext>,
    ) -> Result<Track> {
        self.inner.resolver.decode(identifier, ctx).await
    }
}

/// Classe un échec de handshake
fn failure_kind(error: &tungstenite::Error) -> ConnectionFailureKind {
    match error {
        tungstenite::Error::Http(response) if matches!(response.status().as_u16(), 401 | 403) => {
            ConnectionFailureKind::InvalidCredentials
        }
        tungstenite::Error::Url(_) => ConnectionFailureKind::InvalidUri,
        _ => ConnectionFailureKind::Unreachable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uris() {
        let config = NodeConfig::new("main", "lavalink.local", 2333, "youshallnotpass");
        assert_eq!(config.ws_uri(), "ws://lavalink.local:2333");
        assert_eq!(config.rest_uri(), "http://lavalink.local:2333");

        let config = config.secure(true);
        assert_eq!(config.ws_uri(), "wss://lavalink.local:2333");
        assert_eq!(config.rest_uri(), "https://lavalink.local:2333");
    }

    #[test]
    fn test_client_name() {
        assert!(CLIENT_NAME.starts_with("pmolink/"));
    }

    #[test]
    fn test_node_config_from_yaml() {
        let config: NodeConfig = serde_yaml::from_str(
            "identifier: main\nhost: 127.0.0.1\nport: 2333\npassword: pw\n",
        )
        .unwrap();
        assert!(!config.secure);
        assert!(config.spotify.is_none());
        assert_eq!(config.reconnect, ReconnectPolicy::default());
    }

    #[tokio::test]
    async fn test_new_node_is_disconnected() {
        let node = Node::new(NodeConfig::new("main", "127.0.0.1", 2333, "pw"), 1).unwrap();
        assert_eq!(node.state().await, NodeState::Disconnected);
        assert!(!node.is_available());
        assert!(node.stats().await.is_none());
        assert!(!node.resolver().has_spotify());
    }

    #[tokio::test]
    async fn test_send_requires_availability() {
        let node = Node::new(NodeConfig::new("main", "127.0.0.1", 2333, "pw"), 1).unwrap();
        let err = node.send(&ControlMessage::destroy(1)).await.unwrap_err();
        assert!(matches!(err, LinkError::NodeUnavailable(id) if id == "main"));
    }

    #[tokio::test]
    async fn test_spotify_enabled_with_credentials() {
        let credentials = SpotifyCredentials {
            client_id: "id".into(),
            client_secret: "secret".into(),
            market: None,
        };
        let config = NodeConfig::new("main", "127.0.0.1", 2333, "pw").with_spotify(credentials);
        let node = Node::new(config, 1).unwrap();
        assert!(node.resolver().has_spotify());
    }

    #[tokio::test]
    async fn test_invalid_uri() {
        let node = Node::new(NodeConfig::new("bad", "", 2333, "pw"), 1).unwrap();
        let err = node.connect().await.unwrap_err();
        assert!(matches!(
            err,
            LinkError::ConnectionFailure {
                kind: ConnectionFailureKind::InvalidUri,
                ..
            }
        ));
        assert_eq!(node.state().await, NodeState::Disconnected);
    }
}
