//! Faux nœud Lavalink pour les tests d'intégration
#![allow(dead_code)]

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use pmolink::Session;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

pub const PASSWORD: &str = "youshallnotpass";

struct MockState {
    headers: Mutex<Vec<HashMap<String, String>>>,
    outgoing: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    connections: AtomicUsize,
    reject: AtomicBool,
    handshake_delay_ms: AtomicU64,
}

/// Serveur WebSocket local qui enregistre ce que le client envoie
pub struct MockLavalink {
    pub addr: SocketAddr,
    state: Arc<MockState>,
    received: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
}

impl MockLavalink {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockState {
            headers: Mutex::new(Vec::new()),
            outgoing: Mutex::new(None),
            connections: AtomicUsize::new(0),
            reject: AtomicBool::new(false),
            handshake_delay_ms: AtomicU64::new(0),
        });
        let (received_tx, received_rx) = mpsc::unbounded_channel();

        let accept_state = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = accept_state.clone();
                let received_tx = received_tx.clone();
                tokio::spawn(async move { serve(stream, state, received_tx).await });
            }
        });

        Self {
            addr,
            state,
            received: tokio::sync::Mutex::new(received_rx),
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Refuse les prochains handshakes avec un 401
    pub fn reject_connections(&self, reject: bool) {
        self.state.reject.store(reject, Ordering::SeqCst);
    }

    /// Retarde la réponse aux prochains handshakes
    pub fn delay_handshakes(&self, delay: Duration) {
        self.state.handshake_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn last_headers(&self) -> Option<HashMap<String, String>> {
        self.state.headers.lock().unwrap().last().cloned()
    }

    /// Prochain message texte reçu du client
    pub async fn next_message(&self) -> Value {
        let mut received = self.received.lock().await;
        let text = tokio::time::timeout(Duration::from_secs(5), received.recv())
            .await
            .expect("timed out waiting for a client message")
            .expect("mock server stopped");
        serde_json::from_str(&text).unwrap()
    }

    /// Envoie une trame au client actuellement connecté
    pub async fn push(&self, message: Message) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(sender) = self.state.outgoing.lock().unwrap().as_ref() {
                if sender.send(message.clone()).is_ok() {
                    return;
                }
            }
            assert!(tokio::time::Instant::now() < deadline, "no client connected");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn push_json(&self, value: Value) {
        self.push(Message::Text(value.to_string())).await;
    }

    /// Ferme la connexion courante côté serveur
    pub async fn close_current(&self) {
        self.push(Message::Close(None)).await;
    }
}

async fn serve(
    stream: tokio::net::TcpStream,
    state: Arc<MockState>,
    received_tx: mpsc::UnboundedSender<String>,
) {
    let delay = state.handshake_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let callback_state = state.clone();
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let headers = request
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect::<HashMap<_, _>>();
        let authorized = headers.get("authorization").map(String::as_str) == Some(PASSWORD);
        callback_state.headers.lock().unwrap().push(headers);

        if !authorized || callback_state.reject.load(Ordering::SeqCst) {
            let mut error = ErrorResponse::new(Some("Unauthorized".to_string()));
            *error.status_mut() = StatusCode::UNAUTHORIZED;
            return Err(error);
        }
        Ok(response)
    };

    let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
        return;
    };

    let (mut writer, mut reader) = ws.split();
    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
    *state.outgoing.lock().unwrap() = Some(outgoing_tx);
    state.connections.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            incoming = reader.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let _ = received_tx.send(text);
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
            outgoing = outgoing_rx.recv() => match outgoing {
                Some(Message::Close(frame)) => {
                    let _ = writer.send(Message::Close(frame)).await;
                    break;
                }
                Some(message) => {
                    if writer.send(message).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }
}

/// Session qui enregistre ce qu'elle reçoit
#[derive(Default)]
pub struct RecordingSession {
    pub events: Mutex<Vec<Value>>,
    pub updates: Mutex<Vec<Value>>,
    pub destroyed: AtomicUsize,
}

impl RecordingSession {
    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn destroy_count(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for RecordingSession {
    async fn on_event(&self, payload: Value) {
        self.events.lock().unwrap().push(payload);
    }

    async fn on_player_update(&self, payload: Value) {
        self.updates.lock().unwrap().push(payload);
    }

    async fn destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Attend qu'une condition devienne vraie (5 s maximum)
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
